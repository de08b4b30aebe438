//! Unified error handling for the HTTP layer.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use showcase_core::ValidationError;

use crate::db::RepositoryError;
use crate::files::FileError;

/// Application-level error type returned by handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Repository operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Upload storage failed.
    #[error("File error: {0}")]
    File(#[from] FileError),

    /// Submitted content failed validation.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(RepositoryError::Validation(_))
            | Self::Validation(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::File(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(message)) => format!("Conflict: {message}"),
            Self::Database(RepositoryError::Validation(err)) => format!("Invalid input: {err}"),
            Self::Database(_) | Self::File(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "request failed"
            );
        }

        // Don't expose internal error details to clients
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
