//! Request errors and their HTTP mapping.

use std::path::PathBuf;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use docshelf_core::IndexError;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The requested path would leave the served root.
    #[error("Access denied")]
    Forbidden,

    /// The requested path does not exist.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Reading the path failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A forced refresh could not scan the root.
    #[error(transparent)]
    Refresh(#[from] IndexError),
}

impl ServeError {
    /// Classify an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::Forbidden,
            _ => Self::Io { path, source },
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Io { .. } | Self::Refresh(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
