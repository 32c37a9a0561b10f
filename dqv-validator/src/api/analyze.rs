//! POST /analyze-structure
//!
//! Describes a stored document's layout with the reasoning collaborator.
//! No verdict is produced and nothing is persisted.

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::{note_failure, parse_json_body};
use crate::error::ApiResult;
use crate::AppState;

/// POST /analyze-structure request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeRequest {
    pub blob_name: String,
}

/// POST /analyze-structure response
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub blob_name: String,
    pub document_structure: serde_json::Value,
    pub text_preview: String,
}

/// POST /analyze-structure
///
/// Returns 503 when no reasoning provider is configured.
pub async fn analyze_structure(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<AnalyzeResponse>> {
    let request: AnalyzeRequest = parse_json_body(&body)?;

    match state.orchestrator.analyze_structure(&request.blob_name).await {
        Ok(analysis) => {
            tracing::info!(blob_name = %analysis.blob_name, "Structure analysis complete");
            Ok(Json(AnalyzeResponse {
                success: true,
                blob_name: analysis.blob_name,
                document_structure: analysis.document_structure,
                text_preview: analysis.text_preview,
            }))
        }
        Err(e) => {
            tracing::warn!(blob_name = %request.blob_name, error = %e, "Structure analysis failed");
            note_failure(&state, &e).await;
            Err(e.into())
        }
    }
}

/// Build structure analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/analyze-structure", post(analyze_structure))
}
