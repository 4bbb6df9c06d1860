//! Error taxonomy and the single HTTP boundary translator.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Failures of the document store itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unexpected(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// JSON body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl AppError {
    pub fn unauthorized() -> Self {
        Self::Unauthenticated("Unauthorized".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unexpected(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(StoreError::Codec(err))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Unexpected(format!("password hashing failed: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the log, the client only sees a generic message.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Server error".to_string()
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
            self.to_string()
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
