//! HTTP-facing error type shared by every handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors returned from request handlers.
///
/// State errors (`Gone`, `Unauthorized`) are expected outcomes of a share
/// running out, so they are logged at debug level only.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Gone(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error type placed in the JSON body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Gone(_) => "gone",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Internal(err) => {
                tracing::error!("request failed: {:#}", err);
                "internal server error".to_string()
            }
            AppError::BadRequest(msg) => {
                tracing::warn!("bad request: {}", msg);
                msg.clone()
            }
            AppError::Unauthorized(msg) | AppError::Gone(msg) => {
                tracing::debug!("request rejected: {}", msg);
                msg.clone()
            }
        };

        let body = json!({
            "error": {
                "type": self.kind(),
                "message": message,
            }
        });

        (self.status(), Json(body)).into_response()
    }
}
