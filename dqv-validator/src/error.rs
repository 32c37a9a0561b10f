//! Error types for dqv-validator
//!
//! `ValidationError` is the engine's taxonomy; `ApiError` maps it (and the
//! handler-level failures) onto HTTP responses. Every error response carries
//! the `indeterminate` outcome.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Validation engine errors
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Declared quantity missing or not numeric (client error)
    #[error("Invalid declared quantity: {0}")]
    InvalidQuantity(String),

    /// Missing or malformed request fields (client error)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Storage unreachable, timed out, or reference not found
    #[error("Document unavailable: {0}")]
    DocumentUnavailable(String),

    /// OCR collaborator error, timeout or empty output
    #[error("Text extraction failed: {0}")]
    ExtractionFailed(String),

    /// A result already exists for this record with a different declared quantity
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Reasoning collaborator not configured or failed (structure analysis only)
    #[error("Reasoning collaborator unavailable: {0}")]
    ReasoningUnavailable(String),

    /// Result store read/write failure
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl ValidationError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidQuantity(_) => "INVALID_QUANTITY",
            ValidationError::InvalidRequest(_) => "BAD_REQUEST",
            ValidationError::DocumentUnavailable(_) => "DOCUMENT_UNAVAILABLE",
            ValidationError::ExtractionFailed(_) => "EXTRACTION_FAILED",
            ValidationError::Conflict(_) => "CONFLICT",
            ValidationError::ReasoningUnavailable(_) => "REASONING_UNAVAILABLE",
            ValidationError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ValidationError::InvalidQuantity(_) | ValidationError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ValidationError::DocumentUnavailable(_) | ValidationError::ExtractionFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            ValidationError::Conflict(_) => StatusCode::CONFLICT,
            ValidationError::ReasoningUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ValidationError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client errors are rejected before any document work happens
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Validation engine error (status per error kind)
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Validation(ref err) => (err.status(), err.code(), err.to_string()),
        };

        let body = Json(json!({
            "success": false,
            "outcome": "indeterminate",
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
