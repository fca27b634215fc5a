//! Application-level error type returned by the request handler.
//!
//! Every variant serialises to an [`ErrorResponse`] JSON body and maps to the
//! HTTP status the core assigns it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Human-readable description.
    pub error: String,
    /// Machine-readable code, e.g. `not_found` or `read_only`.
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// An error that the handler can return; converts directly to an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] restmap::Error),

    #[error("request path is not valid UTF-8 once decoded: {0}")]
    BadPath(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Core(e) => (
                StatusCode::from_u16(e.status().code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                e.code(),
            ),
            AppError::BadPath(_) => (StatusCode::BAD_REQUEST, "invalid_path"),
            AppError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            AppError::Body(_) => (StatusCode::BAD_REQUEST, "invalid_body"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let body = ErrorResponse::new(code, self.to_string());
        (status, Json(body)).into_response()
    }
}
