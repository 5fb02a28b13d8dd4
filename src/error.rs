use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{users::repo_types::StoreError, validation::MessageBag};

/// Everything a request can fail with. Each variant maps to one status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(MessageBag),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    /// The body could not be read as JSON at all.
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => {
                AppError::Validation(MessageBag::single("email", "The email has already been taken."))
            }
            StoreError::NotFound => AppError::NotFound("User not found".into()),
            StoreError::Other(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(bag) => json!({ "errors": bag }),
            AppError::NotFound(message)
            | AppError::Unauthorized(message)
            | AppError::Forbidden(message)
            | AppError::BadRequest(message) => json!({ "message": message }),
            AppError::Store(e) => {
                error!(error = ?e, "store failure");
                json!({ "message": "Server Error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
