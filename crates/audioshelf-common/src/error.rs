//! Unified error type for audioshelf.
//!
//! Library, playback, streaming, and fetch code all fail with [`Error`], which
//! carries enough context for HTTP handlers to derive a status code via
//! [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in audioshelf.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "media").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A byte range was malformed or fell outside the resource.
    #[error("Range not satisfiable for resource of {size} bytes")]
    RangeNotSatisfiable {
        /// Total size of the resource, echoed in `Content-Range: bytes */size`.
        size: u64,
    },

    /// A request parameter was missing or invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (yt-dlp) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::RangeNotSatisfiable { .. } => 416,
            Error::InvalidArgument(_) => 400,
            Error::Io { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::RangeNotSatisfiable { .. } => "range_not_satisfiable",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::Io { .. } => "io_error",
            Error::Tool { .. } => "tool_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
