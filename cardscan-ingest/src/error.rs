//! Error types for cardscan-ingest

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Batch admission rejection, returned synchronously before any slot is taken
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Batch of {count} files exceeds the {limit}-file limit")]
    BatchTooLarge { count: usize, limit: usize },
}

/// Errors that terminate a single file's processing.
///
/// Validation and acceptance rejections are NOT errors: they are ordinary
/// terminal outcomes carried in `FileOutcome`, logged and broadcast but never
/// propagated. Only collaborator faults and unexpected failures land here,
/// and they never abort sibling files in the same batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The extraction collaborator raised, or returned nothing usable
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Any other unexpected failure while driving the file
    #[error("Internal failure: {0}")]
    Internal(#[from] anyhow::Error),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g., batch already processing
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// cardscan-common error
    #[error("Common error: {0}")]
    Common(#[from] cardscan_common::Error),
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
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
