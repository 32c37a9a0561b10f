//! Database and configuration fixtures

use dqv_common::db::create_validation_results_table;
use dqv_validator::services::EngineConfig;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::time::Duration;

/// In-memory result database with the schema applied
///
/// Single connection: every connection to `sqlite::memory:` is its own database.
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    create_validation_results_table(&pool)
        .await
        .expect("Failed to create schema");
    pool
}

/// Default matching with short collaborator timeouts
pub fn test_engine_config() -> EngineConfig {
    EngineConfig {
        storage_timeout: Duration::from_secs(2),
        ocr_timeout: Duration::from_secs(2),
        reasoning_timeout: Duration::from_millis(200),
        ..EngineConfig::default()
    }
}
