//! Health check endpoint
//!
//! Reports uptime plus reachability of each collaborator. A disabled
//! reasoning provider does not make the service degraded.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    /// Module name ("dqv-validator")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    pub storage_reachable: bool,
    pub ocr_reachable: bool,
    pub reasoning_reachable: bool,
    pub reasoning_enabled: bool,
    /// Name of the configured reasoning provider
    pub reasoning_provider: String,
    /// Last server-side error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let collaborators = state.orchestrator.collaborator_health().await;
    let healthy = collaborators.storage_reachable
        && collaborators.ocr_reachable
        && (collaborators.reasoning_reachable || !collaborators.reasoning_enabled);

    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        module: "dqv-validator".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        storage_reachable: collaborators.storage_reachable,
        ocr_reachable: collaborators.ocr_reachable,
        reasoning_reachable: collaborators.reasoning_reachable,
        reasoning_enabled: collaborators.reasoning_enabled,
        reasoning_provider: state.orchestrator.reasoning_provider().to_string(),
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
