//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>` and use `?` on
//! [`audioshelf_common::Error`].

use audioshelf_common::Error;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

// Extractor rejections are client errors.
impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::invalid_argument(rejection.body_text()))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::invalid_argument(rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.0,
                "Server error in API handler"
            );
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            self.0.to_string()
        };

        let body = json!({
            "error": message,
            "code": self.0.code(),
        });

        let mut response = (status, axum::Json(body)).into_response();
        if let Error::RangeNotSatisfiable { size } = self.0 {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}
