//! Test Helper Utilities
//!
//! In-memory collaborators and database setup shared by the integration tests

#![allow(dead_code)]

pub mod collaborators;
pub mod db_utils;

pub use collaborators::{EmptyTextExtractor, FailingTextExtractor, MemoryDocumentStore};
pub use db_utils::{create_test_pool, test_engine_config};

use dqv_validator::collaborators::{LocalTextExtractor, TextExtractor};
use dqv_validator::contextual::{ContextualValidator, DisabledValidator};
use dqv_validator::services::{EngineConfig, ValidationOrchestrator};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Orchestrator over in-memory collaborators
///
/// Text documents go through the local extractor unchanged.
pub fn create_test_orchestrator(
    store: Arc<MemoryDocumentStore>,
    reasoning: Arc<dyn ContextualValidator>,
    pool: &SqlitePool,
) -> ValidationOrchestrator {
    create_test_orchestrator_with(store, Arc::new(LocalTextExtractor), reasoning, pool, test_engine_config())
}

pub fn create_test_orchestrator_with(
    store: Arc<MemoryDocumentStore>,
    ocr: Arc<dyn TextExtractor>,
    reasoning: Arc<dyn ContextualValidator>,
    pool: &SqlitePool,
    config: EngineConfig,
) -> ValidationOrchestrator {
    ValidationOrchestrator::new(config, store, ocr, reasoning, pool.clone())
}

/// Reasoning collaborator that is switched off
pub fn disabled_reasoning() -> Arc<dyn ContextualValidator> {
    Arc::new(DisabledValidator)
}
