//! POST /validate
//!
//! Declared quantity comes from the `X-Discharge-Quantity` header; a
//! `delivery_quantity` body field is accepted when the header is absent.
//! A quantity that does not parse is rejected before any document work.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{note_failure, parse_json_body};
use crate::error::{ApiResult, ValidationError};
use crate::models::{DeterministicVerdict, Outcome, SemanticVerdict, ValidationRequest};
use crate::services::ValidationRun;
use crate::AppState;

/// Header carrying the declared discharge quantity
pub const QUANTITY_HEADER: &str = "x-discharge-quantity";

/// POST /validate request body
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ValidateBody {
    pub record_id: Option<String>,
    pub blob_name: Option<String>,
    /// Number or numeric string; only read when the header is absent
    pub delivery_quantity: Option<serde_json::Value>,
}

/// Deterministic verdict plus the request and document it was computed for
#[derive(Debug, Serialize)]
pub struct ValidationResultView {
    #[serde(flatten)]
    pub deterministic: DeterministicVerdict,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub declared_quantity: Decimal,
    pub blob_name: String,
    pub document_digest: String,
    pub text_preview: String,
}

/// POST /validate response
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub record_id: String,
    pub outcome: Outcome,
    pub final_passed: bool,
    pub final_confidence: u8,
    pub disagreement: bool,
    pub remarks: String,
    /// Answered from a previously stored result
    pub replayed: bool,
    pub validation_result: ValidationResultView,
    pub ai_agent: SemanticVerdict,
    pub processed_at: DateTime<Utc>,
}

impl From<ValidationRun> for ValidateResponse {
    fn from(run: ValidationRun) -> Self {
        let result = run.result;
        Self {
            success: true,
            record_id: result.record_id,
            outcome: result.outcome,
            final_passed: result.final_passed,
            final_confidence: result.final_confidence,
            disagreement: result.disagreement,
            remarks: result.remarks,
            replayed: run.replayed,
            validation_result: ValidationResultView {
                deterministic: result.deterministic,
                declared_quantity: result.declared_quantity,
                blob_name: result.blob_name,
                document_digest: result.document_digest,
                text_preview: result.text_preview,
            },
            ai_agent: result.semantic,
            processed_at: result.processed_at,
        }
    }
}

/// Parse a declared quantity as sent by the caller
pub fn parse_quantity(raw: &str) -> Result<Decimal, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidQuantity(
            "declared quantity is empty".to_string(),
        ));
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| {
            ValidationError::InvalidQuantity(format!("'{}' is not a number", trimmed))
        })
}

fn declared_quantity(headers: &HeaderMap, body: &ValidateBody) -> Result<Decimal, ValidationError> {
    if let Some(value) = headers.get(QUANTITY_HEADER) {
        let raw = value.to_str().map_err(|_| {
            ValidationError::InvalidQuantity(format!("{} is not valid text", QUANTITY_HEADER))
        })?;
        return parse_quantity(raw);
    }

    match &body.delivery_quantity {
        Some(serde_json::Value::Number(n)) => parse_quantity(&n.to_string()),
        Some(serde_json::Value::String(s)) => parse_quantity(s),
        Some(serde_json::Value::Null) | None => Err(ValidationError::InvalidQuantity(
            "X-Discharge-Quantity header is required".to_string(),
        )),
        Some(other) => Err(ValidationError::InvalidQuantity(format!(
            "delivery_quantity must be a number, got {}",
            other
        ))),
    }
}

/// POST /validate
///
/// Runs one validation. Completed validations (passed or failed) return 200;
/// errors return the error body with outcome `indeterminate`.
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ValidateResponse>> {
    let request = match parse_request(&headers, &body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected validation request");
            return Err(e.into());
        }
    };

    match state.orchestrator.validate(request).await {
        Ok(run) => Ok(Json(ValidateResponse::from(run))),
        Err(e) => {
            note_failure(&state, &e).await;
            Err(e.into())
        }
    }
}

fn parse_request(headers: &HeaderMap, body: &[u8]) -> Result<ValidationRequest, ValidationError> {
    let body: ValidateBody = parse_json_body(body)?;
    let declared = declared_quantity(headers, &body)?;
    ValidationRequest::new(
        declared,
        body.blob_name.unwrap_or_default(),
        body.record_id.unwrap_or_default(),
    )
}

/// Build validation routes
pub fn validate_routes() -> Router<AppState> {
    Router::new().route("/validate", post(validate))
}
