//! Error types for the HTTP API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid credentials. Rejected before any query runs.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller exists but may not perform this action.
    #[error("forbidden")]
    Forbidden,

    /// The referenced record does not exist (or is not visible).
    #[error("not found")]
    NotFound,

    /// The request body failed validation.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// A domain state machine rejected the transition.
    #[error(transparent)]
    Domain(#[from] lotcast_core::DomainError),

    /// A required secret or key was never configured.
    #[error("misconfigured: {0}")]
    Config(&'static str),

    /// Storage failure.
    #[error("storage error: {0}")]
    Store(#[from] lotcast_db::StoreError),

    /// A reminder run failed outright.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] lotcast_scheduler::SchedulerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(_) => StatusCode::CONFLICT,
            ApiError::Config(_) | ApiError::Store(_) | ApiError::Scheduler(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
