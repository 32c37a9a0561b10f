//! GET /results/:record_id
//!
//! Returns the stored result exactly as it was persisted.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /results/:record_id
pub async fn get_result(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> ApiResult<Response> {
    let result_json = state
        .orchestrator
        .stored_result(&record_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No result for record {}", record_id)))?;

    Ok(([(header::CONTENT_TYPE, "application/json")], result_json).into_response())
}

/// Build result lookup routes
pub fn result_routes() -> Router<AppState> {
    Router::new().route("/results/:record_id", get(get_result))
}
