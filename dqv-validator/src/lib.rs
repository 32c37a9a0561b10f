//! dqv-validator library interface
//!
//! Validates a declared delivery/discharge quantity against the quantity
//! printed on a supporting document. Exposes the engine and router for
//! integration testing.

pub mod api;
pub mod collaborators;
pub mod config;
pub mod contextual;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, ValidationError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::services::ValidationOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Validation engine with its collaborators and result store
    pub orchestrator: Arc<ValidationOrchestrator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last server-side error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<ValidationOrchestrator>) -> Self {
        Self {
            orchestrator,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::validate_routes())
        .merge(api::analyze_routes())
        .merge(api::result_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
