use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// The HTTP ingress's error taxonomy. Each variant maps to one status code and a
/// `{"detail": ...}` body, following this codebase's `IntoResponse`-per-error-enum
/// convention (see `capture::api::CaptureError`).
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("job not found")]
    NotFound,

    #[error("missing or invalid api key")]
    Unauthorized,

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("store error: {0}")]
    Store(queue_core::QueueError),
}

impl From<queue_core::QueueError> for ApiError {
    fn from(error: queue_core::QueueError) -> Self {
        match error {
            queue_core::QueueError::InvalidArgument(message) => ApiError::InvalidArgument(message),
            other => ApiError::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
