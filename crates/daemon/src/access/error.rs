use axum::response::{IntoResponse, Response};
use http::StatusCode;

use common::prelude::FileId;
use content_store::ContentStoreError;

/// Every way an access decision or a committed operation can fail.
///
/// The variant decides the HTTP status; messages of the storage and
/// configuration variants are logged but never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("authentication failed")]
    AuthFailure,
    #[error("unsupported content type: {0}")]
    Unsupported(String),
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("content store error: {0}")]
    Content(#[from] ContentStoreError),
    #[error("content of file {0} is missing")]
    MissingContent(FileId),
    #[error("commit task failed: {0}")]
    Commit(#[from] tokio::task::JoinError),
    #[error("deadline exceeded")]
    Timeout,
}

impl AccessError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        AccessError::NotFound(what.to_string())
    }

    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            AccessError::Database(_)
                | AccessError::Content(_)
                | AccessError::MissingContent(_)
                | AccessError::Commit(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::NotFound(_) => StatusCode::NOT_FOUND,
            AccessError::Forbidden(_) => StatusCode::FORBIDDEN,
            AccessError::AuthFailure => StatusCode::UNAUTHORIZED,
            AccessError::Unsupported(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AccessError::Malformed(_) => StatusCode::BAD_REQUEST,
            AccessError::Conflict(_) => StatusCode::CONFLICT,
            AccessError::Configuration(_)
            | AccessError::Database(_)
            | AccessError::Content(_)
            | AccessError::MissingContent(_)
            | AccessError::Commit(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AccessError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<password_hash::Error> for AccessError {
    fn from(err: password_hash::Error) -> Self {
        AccessError::Configuration(format!("password hash: {err}"))
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AccessError::Configuration(_)
            | AccessError::Database(_)
            | AccessError::Content(_)
            | AccessError::MissingContent(_)
            | AccessError::Commit(_) => {
                tracing::error!(error = %self, "request failed");
                "Unexpected error".to_string()
            }
            AccessError::AuthFailure => "Authentication failed".to_string(),
            AccessError::Timeout => "Deadline exceeded".to_string(),
            AccessError::NotFound(msg) => format!("Not found: {msg}"),
            AccessError::Forbidden(msg) => format!("Forbidden: {msg}"),
            AccessError::Unsupported(msg) => format!("Unsupported content type: {msg}"),
            AccessError::Malformed(msg) => format!("Bad request: {msg}"),
            AccessError::Conflict(msg) => format!("Conflict: {msg}"),
        };

        (status, body).into_response()
    }
}
