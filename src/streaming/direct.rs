//! Direct streaming with HTTP range requests.

use audioshelf_common::paths::content_type_for;
use audioshelf_common::{Error, MediaName};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use futures::TryStreamExt;

use super::range::ByteRange;
use crate::library::MediaStore;
use crate::server::{AppContext, AppError};

/// `GET /media/:name` and `GET /audiobooks/:name`.
pub async fn stream_media(
    State(ctx): State<AppContext>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let name = MediaName::parse(name)?;
    serve(ctx.store.as_ref(), &name, headers.get(header::RANGE)).await
}

/// Build the full (200) or partial (206) response for `name`.
///
/// A range is validated against the current file size before any bytes are
/// read. The full response takes its length from the opened file, so
/// `Content-Length` always matches the body. A read failure after the
/// headers went out only ends this response's body.
pub async fn serve(
    store: &dyn MediaStore,
    name: &MediaName,
    range_header: Option<&HeaderValue>,
) -> Result<Response, AppError> {
    if !store.accepts(name) {
        return Err(Error::not_found("media", name).into());
    }
    let content_type = content_type_for(name.as_str());

    let (status, size, range, stream) = match range_header {
        Some(value) => {
            let size = store.stat(name).await?;
            let value = value
                .to_str()
                .map_err(|_| Error::RangeNotSatisfiable { size })?;
            let range = ByteRange::parse(value, size)?;
            let stream = store.open_range_reader(name, range.start, range.end).await?;
            (StatusCode::PARTIAL_CONTENT, size, Some(range), stream)
        }
        None => {
            let (size, stream) = store.open_reader(name).await?;
            (StatusCode::OK, size, None, stream)
        }
    };
    let length = range.map_or(size, |r| r.len());

    tracing::debug!(
        name = %name,
        size,
        range = ?range,
        "Streaming media"
    );

    let log_name = name.clone();
    let stream = stream.inspect_err(move |e| {
        tracing::warn!(name = %log_name, "Media stream aborted: {e}");
    });

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(range) = range {
        builder = builder.header(header::CONTENT_RANGE, range.content_range(size));
    }

    builder
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Internal(format!("Failed to build response: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{ByteStream, FsMediaStore};
    use http_body_util::BodyExt;

    fn library(file_name: &str, data: &[u8]) -> (tempfile::TempDir, FsMediaStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(file_name), data).unwrap();
        let store = FsMediaStore::new(dir.path(), vec!["mp3".to_string()], 1024 * 1024).unwrap();
        (dir, store)
    }

    fn name(s: &str) -> MediaName {
        MediaName::parse(s).unwrap()
    }

    async fn body(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn full_content_without_range() {
        let data = pattern(1000);
        let (_dir, store) = library("book.mp3", &data);

        let response = serve(&store, &name("book.mp3"), None).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert!(response.headers().get(header::CONTENT_RANGE).is_none());
        assert_eq!(body(response).await, data);
    }

    #[tokio::test]
    async fn partial_content() {
        let data = pattern(1000);
        let (_dir, store) = library("book.mp3", &data);
        let range = HeaderValue::from_static("bytes=500-999");

        let response = serve(&store, &name("book.mp3"), Some(&range))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 500-999/1000");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "500");
        assert_eq!(body(response).await, &data[500..]);
    }

    #[tokio::test]
    async fn range_past_end_is_rejected_before_reading() {
        let (_dir, store) = library("book.mp3", &pattern(1000));
        let range = HeaderValue::from_static("bytes=1000-1999");

        let err = serve(&store, &name("book.mp3"), Some(&range))
            .await
            .unwrap_err();
        assert!(matches!(err.0, Error::RangeNotSatisfiable { size: 1000 }));
    }

    #[tokio::test]
    async fn empty_file_streams_empty_body() {
        let (_dir, store) = library("empty.mp3", b"");
        let response = serve(&store, &name("empty.mp3"), None).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
        assert!(body(response).await.is_empty());
    }

    /// Store whose `stat` reports the size the file had before it was
    /// replaced.
    struct ReplacedAfterStat {
        inner: FsMediaStore,
        stale_size: u64,
    }

    #[async_trait::async_trait]
    impl MediaStore for ReplacedAfterStat {
        async fn list(&self) -> audioshelf_common::Result<Vec<MediaName>> {
            self.inner.list().await
        }
        async fn stat(&self, _name: &MediaName) -> audioshelf_common::Result<u64> {
            Ok(self.stale_size)
        }
        async fn open_reader(
            &self,
            name: &MediaName,
        ) -> audioshelf_common::Result<(u64, ByteStream)> {
            self.inner.open_reader(name).await
        }
        async fn open_range_reader(
            &self,
            name: &MediaName,
            start: u64,
            end: u64,
        ) -> audioshelf_common::Result<ByteStream> {
            self.inner.open_range_reader(name, start, end).await
        }
        async fn put(
            &self,
            name: &MediaName,
            body: ByteStream,
        ) -> audioshelf_common::Result<u64> {
            self.inner.put(name, body).await
        }
        async fn delete(&self, name: &MediaName) -> audioshelf_common::Result<()> {
            self.inner.delete(name).await
        }
        fn accepts(&self, name: &MediaName) -> bool {
            self.inner.accepts(name)
        }
    }

    #[tokio::test]
    async fn full_content_length_matches_the_file_actually_opened() {
        let data = pattern(2000);
        let (_dir, inner) = library("book.mp3", &data);
        let store = ReplacedAfterStat {
            inner,
            stale_size: 1000,
        };

        let response = serve(&store, &name("book.mp3"), None).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "2000");
        assert_eq!(body(response).await, data);
    }

    #[tokio::test]
    async fn unknown_or_unlisted_media_is_not_found() {
        let (_dir, store) = library("notes.txt", b"hello");
        for missing in ["missing.mp3", "notes.txt"] {
            let err = serve(&store, &name(missing), None).await.unwrap_err();
            assert!(matches!(err.0, Error::NotFound { .. }), "{missing}");
        }
    }
}
