//! Error types for nearby-feed
//!
//! Store and provider faults are absorbed inside the pipeline and never reach
//! this level. `FeedError` covers the internal faults that may fail a request;
//! `ApiError` maps everything onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unrecoverable feed-assembly faults
#[derive(Debug, Error)]
pub enum FeedError {
    /// Region key could not be formed from the request
    #[error("Invalid region signature: {0}")]
    InvalidSignature(String),

    /// A population task panicked or was cancelled by the runtime
    #[error("Population task failed: {0}")]
    PopulationTask(String),

    /// Configured filter pattern does not compile
    #[error("Invalid filter rules: {0}")]
    InvalidRules(#[from] regex::Error),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Feed(#[from] FeedError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Feed(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "FEED_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
