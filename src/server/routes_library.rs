//! Library management routes: listing, uploads, deletes and fetches.

use std::io;

use audioshelf_common::{Error, MediaItem, MediaName};
use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::{channel::mpsc, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use super::{AppContext, AppError};

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "audiobook";

/// Headroom on top of the file size for multipart framing.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Create library routes.
pub fn library_routes(max_upload_bytes: u64) -> Router<AppContext> {
    let body_limit = usize::try_from(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/audiobooks.json", get(list_media))
        .route(
            "/upload",
            post(upload_media).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/delete-audiobook", delete(delete_media))
        .route("/fetch", post(fetch_media))
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchResponse {
    pub success: bool,
    pub message: String,
    pub name: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// `GET /audiobooks.json`
pub async fn list_media(State(ctx): State<AppContext>) -> Result<Json<Vec<MediaItem>>, AppError> {
    Ok(Json(ctx.store.items().await?))
}

/// `POST /upload` with the file in the `audiobook` multipart field.
///
/// The field is piped into the store as it arrives; nothing is buffered
/// beyond a few chunks.
pub async fn upload_media(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<Json<ActionResponse>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(base_name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::invalid_argument("No file uploaded."))?;
        let name = MediaName::parse(file_name)?;
        if !ctx.store.accepts(&name) {
            return Err(Error::invalid_argument(format!(
                "\"{name}\" is not a supported audio file"
            ))
            .into());
        }

        let (tx, rx) = mpsc::channel(4);
        let (stored, forwarded) =
            tokio::join!(ctx.store.put(&name, rx.boxed()), forward_field(field, tx));
        forwarded.map_err(multipart_error)?;
        let size = stored?;

        tracing::info!(name = %name, size, "Uploaded media");
        return Ok(Json(ActionResponse::ok(format!(
            "Audiobook \"{name}\" uploaded successfully."
        ))));
    }

    Err(Error::invalid_argument("No file uploaded.").into())
}

/// `DELETE /delete-audiobook?name=<name>`
///
/// Also drops the saved playback position for the deleted file.
pub async fn delete_media(
    State(ctx): State<AppContext>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<Json<ActionResponse>, AppError> {
    let Query(query) = query?;
    let name = query
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::invalid_argument("Audiobook name parameter is missing."))?;
    let name = MediaName::parse(name)?;

    ctx.store.delete(&name).await?;
    tracing::info!(name = %name, "Deleted media");

    if let Err(e) = ctx.positions.forget(name.as_str()).await {
        tracing::error!(name = %name, "Failed to remove playback position: {e}");
    }

    Ok(Json(ActionResponse::ok(format!(
        "Audiobook \"{name}\" deleted successfully."
    ))))
}

/// `POST /fetch` with `{"url": "..."}`.
pub async fn fetch_media(
    State(ctx): State<AppContext>,
    request: Result<Json<FetchRequest>, JsonRejection>,
) -> Result<Json<FetchResponse>, AppError> {
    let Json(request) = request?;
    let fetcher = ctx
        .fetcher
        .as_ref()
        .ok_or_else(|| Error::not_found("feature", "fetch"))?;
    let url = request
        .url
        .ok_or_else(|| Error::invalid_argument("url is missing"))?;
    let url = crate::fetch::validate_url(&url)?;

    let fetched = fetcher.fetch_audio(url).await?;
    let name = fetched.media_name()?;
    if !ctx.store.accepts(&name) {
        return Err(Error::tool(
            "yt-dlp",
            format!("downloaded format .{} is not a library extension", fetched.extension),
        )
        .into());
    }

    let size = ctx
        .store
        .put(&name, fetched.stream)
        .await
        .map_err(|e| match e {
            Error::Io { source } => Error::tool("yt-dlp", source.to_string()),
            other => other,
        })?;

    tracing::info!(name = %name, size, "Fetched media from {}", url);
    Ok(Json(FetchResponse {
        success: true,
        message: format!("Audiobook \"{name}\" fetched successfully."),
        name: name.into(),
    }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Push the field's chunks into `tx` until the field ends, the store stops
/// reading, or the request body fails.
async fn forward_field(
    mut field: axum::extract::multipart::Field<'_>,
    mut tx: mpsc::Sender<io::Result<Bytes>>,
) -> Result<(), MultipartError> {
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if tx.send(Ok(chunk)).await.is_err() {
                    return Ok(());
                }
            }
            Ok(None) => return Ok(()),
            Err(e) => {
                let _ = tx
                    .send(Err(io::Error::other(format!("upload interrupted: {e}"))))
                    .await;
                return Err(e);
            }
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    Error::invalid_argument(format!("Invalid upload: {}", e.body_text())).into()
}

/// Strip any client-side directory from an upload's file name.
fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim()
}
