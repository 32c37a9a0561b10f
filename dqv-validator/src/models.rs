//! Validation data model
//!
//! Requests, extracted candidates, the two verdicts and the merged result
//! record. Decimal values serialize as exact JSON numbers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A validation request as submitted by the system of record
///
/// Immutable once created; consumed by a single orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    declared_quantity: Decimal,
    document_reference: String,
    record_id: String,
}

impl ValidationRequest {
    /// Create request, rejecting blank identifiers
    pub fn new(
        declared_quantity: Decimal,
        document_reference: impl Into<String>,
        record_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let document_reference = document_reference.into().trim().to_string();
        let record_id = record_id.into().trim().to_string();

        if record_id.is_empty() {
            return Err(ValidationError::InvalidRequest(
                "record_id must not be empty".to_string(),
            ));
        }
        if document_reference.is_empty() {
            return Err(ValidationError::InvalidRequest(
                "blob_name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            declared_quantity,
            document_reference,
            record_id,
        })
    }

    pub fn declared_quantity(&self) -> Decimal {
        self.declared_quantity
    }

    pub fn document_reference(&self) -> &str {
        &self.document_reference
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }
}

/// Source format of an extracted numeric token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatTag {
    Plain,
    ThousandsSeparated,
    CurrencyLike,
    DateLike,
}

/// Where a candidate was found (byte offset into the text, 1-based line)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionHint {
    pub offset: usize,
    pub line: usize,
}

/// A numeric token extracted from document text, not yet judged relevant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericCandidate {
    pub raw_text: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub parsed_value: Decimal,
    pub position_hint: Option<PositionHint>,
    pub format_tag: FormatTag,
}

/// Tolerance-based match result, independent of any reasoning collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicVerdict {
    pub matched: bool,
    #[serde(with = "rust_decimal::serde::arbitrary_precision_option")]
    pub matched_value: Option<Decimal>,
    /// All candidates in reading order, date components included
    pub candidates: Vec<NumericCandidate>,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub tolerance_used: Decimal,
    /// Value of the labeled discharged-quantity field, when the document has one
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub labeled_value: Option<Decimal>,
}

/// Reasoning collaborator's judgment of which candidate is the target field
///
/// When `available` is false every other field is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticVerdict {
    pub available: bool,
    pub is_valid: Option<bool>,
    #[serde(with = "rust_decimal::serde::arbitrary_precision_option")]
    pub matched_value: Option<Decimal>,
    pub confidence: Option<u8>,
    pub reasoning: Option<String>,
    pub field_location_hint: Option<String>,
}

impl SemanticVerdict {
    /// Verdict for an unreachable, disabled or unparsable collaborator
    pub fn unavailable() -> Self {
        Self {
            available: false,
            is_valid: None,
            matched_value: None,
            confidence: None,
            reasoning: None,
            field_location_hint: None,
        }
    }
}

/// User-visible tri-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    /// No verdict could be produced (request failed before MERGED)
    Indeterminate,
}

/// Terminal artifact of one validation, persisted once per record_id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub record_id: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub declared_quantity: Decimal,
    pub blob_name: String,
    /// SHA-256 (lowercase hex) of the document bytes that were validated
    pub document_digest: String,
    pub text_preview: String,
    pub deterministic: DeterministicVerdict,
    pub semantic: SemanticVerdict,
    pub final_passed: bool,
    pub final_confidence: u8,
    pub outcome: Outcome,
    /// Semantic verdict available and contradicting the deterministic match
    pub disagreement: bool,
    pub remarks: String,
    pub processed_at: DateTime<Utc>,
}
