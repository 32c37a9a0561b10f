//! HTTP API handlers for dqv-validator
//!
//! POST /validate, POST /analyze-structure, GET /results/:record_id, GET /health

pub mod analyze;
pub mod health;
pub mod results;
pub mod validate;

pub use analyze::analyze_routes;
pub use health::health_routes;
pub use results::result_routes;
pub use validate::validate_routes;

use serde::de::DeserializeOwned;

use crate::error::ValidationError;
use crate::AppState;

/// Decode a JSON request body, reporting failures in the service error format
pub(crate) fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::InvalidRequest(
            "request body must be a JSON object".to_string(),
        ));
    }
    serde_json::from_slice(body)
        .map_err(|e| ValidationError::InvalidRequest(format!("malformed JSON body: {}", e)))
}

/// Remember a server-side failure for /health diagnostics
pub(crate) async fn note_failure(state: &AppState, err: &ValidationError) {
    if !err.is_client_error() {
        *state.last_error.write().await = Some(err.to_string());
    }
}
