//! Playback position routes.
//!
//! Players poll the saved offset when a book is opened and push the current
//! offset back while playing. Parameters come from the query string.

use audioshelf_common::Error;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{AppContext, AppError};

/// Create playback routes.
pub fn playback_routes() -> Router<AppContext> {
    Router::new()
        .route("/playback-time", get(get_playback_time))
        .route("/save-playback-time", post(save_playback_time))
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Every field is optional so that missing or malformed values reach the
/// handler and come back as 400s with a JSON body. Rejections the extractor
/// itself raises (a repeated key) are mapped to 400s as well.
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackQuery {
    pub audiobook: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaybackTimeResponse {
    pub time: f64,
}

// ============================================================================
// Handlers
// ============================================================================

/// `GET /playback-time?audiobook=<name>`
pub async fn get_playback_time(
    State(ctx): State<AppContext>,
    query: Result<Query<PlaybackQuery>, QueryRejection>,
) -> Result<Json<PlaybackTimeResponse>, AppError> {
    let Query(query) = query?;
    let name = required_name(&query)?;
    let time = ctx.positions.get(name).await?;
    Ok(Json(PlaybackTimeResponse { time }))
}

/// `POST /save-playback-time?audiobook=<name>&time=<seconds>`
pub async fn save_playback_time(
    State(ctx): State<AppContext>,
    query: Result<Query<PlaybackQuery>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    let Query(query) = query?;
    let name = required_name(&query)?;
    let time = query
        .time
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| Error::invalid_argument("time parameter is missing"))?;
    let time: f64 = time
        .parse()
        .map_err(|_| Error::invalid_argument(format!("time is not a number: {time:?}")))?;

    ctx.positions.set(name, time).await?;
    Ok(StatusCode::OK)
}

fn required_name(query: &PlaybackQuery) -> Result<&str, Error> {
    query
        .audiobook
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::invalid_argument("audiobook parameter is missing"))
}
