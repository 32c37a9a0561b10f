//! Validation result persistence
//!
//! One row per record_id, written once. `result_json` is stored exactly as
//! serialized and returned unchanged on every read.

use dqv_common::time::to_persisted;
use dqv_common::{Error, Result};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};

use crate::models::ValidationResult;

/// A persisted result row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub record_id: String,
    /// Declared quantity in canonical form (trailing zeros removed)
    pub declared_quantity: String,
    pub result_json: String,
}

impl StoredResult {
    /// Whether this row was produced for the same declared quantity
    pub fn matches_quantity(&self, declared: Decimal) -> bool {
        self.declared_quantity == canonical_quantity(declared)
    }

    pub fn into_result(self) -> Result<ValidationResult> {
        serde_json::from_str(&self.result_json).map_err(|e| {
            Error::Internal(format!(
                "Stored result for {} is unreadable: {}",
                self.record_id, e
            ))
        })
    }
}

/// `1234.50` and `1234.5` are the same declared quantity
pub fn canonical_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Load the stored result for a record
pub async fn find_result(pool: &SqlitePool, record_id: &str) -> Result<Option<StoredResult>> {
    let row = sqlx::query(
        "SELECT record_id, declared_quantity, result_json FROM validation_results WHERE record_id = ?",
    )
    .bind(record_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| StoredResult {
        record_id: row.get("record_id"),
        declared_quantity: row.get("declared_quantity"),
        result_json: row.get("result_json"),
    }))
}

/// Insert a result unless the record already has one
///
/// Returns `false` when a row for `record_id` already existed; the existing
/// row is left untouched.
pub async fn insert_result(
    pool: &SqlitePool,
    result: &ValidationResult,
    result_json: &str,
) -> Result<bool> {
    let outcome = sqlx::query(
        r#"
        INSERT INTO validation_results (
            record_id, declared_quantity, final_passed, result_json, processed_at
        ) VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(record_id) DO NOTHING
        "#,
    )
    .bind(&result.record_id)
    .bind(canonical_quantity(result.declared_quantity))
    .bind(result.final_passed)
    .bind(result_json)
    .bind(to_persisted(&result.processed_at))
    .execute(pool)
    .await?;

    Ok(outcome.rows_affected() == 1)
}

/// Number of stored results
pub async fn count_results(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM validation_results")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
