//! Integration tests for media streaming with range requests.

mod common;

use common::{pattern, TestHarness};

#[tokio::test]
async fn full_file_without_range() {
    let (h, addr) = TestHarness::with_server().await;
    let data = pattern(1000);
    h.add_file("book.mp3", &data);

    let resp = reqwest::get(format!("http://{addr}/media/book.mp3"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "audio/mpeg");
    assert_eq!(resp.headers()["content-length"], "1000");
    assert_eq!(resp.headers()["accept-ranges"], "bytes");
    assert!(resp.headers().get("content-range").is_none());
    assert_eq!(resp.bytes().await.unwrap().as_ref(), data.as_slice());
}

#[tokio::test]
async fn range_returns_exact_slice() {
    let (h, addr) = TestHarness::with_server().await;
    let data = pattern(1000);
    h.add_file("book.mp3", &data);

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/media/book.mp3"))
        .header("Range", "bytes=500-999")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 500-999/1000");
    assert_eq!(resp.headers()["content-length"], "500");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &data[500..1000]);
}

#[tokio::test]
async fn ranges_anywhere_in_file() {
    let (h, addr) = TestHarness::with_server().await;
    let data = pattern(200_000);
    h.add_file("long.m4b", &data);
    let client = reqwest::Client::new();

    for (start, end) in [(0u64, 0u64), (1, 65_536), (65_535, 131_072), (199_999, 199_999)] {
        let resp = client
            .get(format!("http://{addr}/media/long.m4b"))
            .header("Range", format!("bytes={start}-{end}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 206);
        assert_eq!(resp.headers()["content-type"], "audio/mp4");
        let body = resp.bytes().await.unwrap();
        assert_eq!(body.as_ref(), &data[start as usize..=end as usize]);
    }
}

#[tokio::test]
async fn open_ended_range() {
    let (h, addr) = TestHarness::with_server().await;
    let data = pattern(1000);
    h.add_file("book.mp3", &data);

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/media/book.mp3"))
        .header("Range", "bytes=900-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 900-999/1000");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &data[900..]);
}

#[tokio::test]
async fn range_past_end_is_416() {
    let (h, addr) = TestHarness::with_server().await;
    h.add_file("book.mp3", &pattern(1000));
    let client = reqwest::Client::new();

    for range in ["bytes=1000-1999", "bytes=0-1000", "bytes=-100", "bytes=abc-", "0-10"] {
        let resp = client
            .get(format!("http://{addr}/media/book.mp3"))
            .header("Range", range)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 416, "{range}");
        assert_eq!(resp.headers()["content-range"], "bytes */1000", "{range}");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "range_not_satisfiable");
    }
}

#[tokio::test]
async fn empty_file_streams_without_range() {
    let (h, addr) = TestHarness::with_server().await;
    h.add_file("empty.wav", b"");

    let resp = reqwest::get(format!("http://{addr}/media/empty.wav"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "audio/wav");
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_media_is_404() {
    let (_h, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!("http://{addr}/media/missing.mp3"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn traversal_names_are_rejected() {
    let (h, addr) = TestHarness::with_server().await;
    h.add_file("book.mp3", b"data");

    let resp = reqwest::get(format!("http://{addr}/media/..%2Fplayback-times.json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn legacy_route_serves_same_content() {
    let (h, addr) = TestHarness::with_server().await;
    let data = pattern(300);
    h.add_file("My Book.mp3", &data);

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/audiobooks/My%20Book.mp3"))
        .header("Range", "bytes=100-199")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &data[100..200]);
}
