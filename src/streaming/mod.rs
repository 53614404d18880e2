//! Media streaming module.
//!
//! Serves library files with single-range `Range` support so players can
//! seek without downloading the whole file.
//!
//! # Routes
//!
//! - `GET /media/:name` - full file (200) or requested range (206)
//! - `GET /audiobooks/:name` - same handler, kept for older players

mod direct;
pub mod range;

pub use direct::{serve, stream_media};
pub use range::ByteRange;

use axum::{routing::get, Router};

use crate::server::AppContext;

/// Create the media streaming router.
pub fn media_router() -> Router<AppContext> {
    Router::new()
        .route("/media/:name", get(stream_media))
        .route("/audiobooks/:name", get(stream_media))
}
