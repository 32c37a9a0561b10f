//! Validation orchestrator
//!
//! # State Progression
//! RECEIVED → TEXT_RETRIEVED → DETERMINISTIC_DONE → SEMANTIC_ATTEMPTED → MERGED → COMPLETE
//!
//! Any failure before MERGED ends in FAILED and nothing is persisted. Document
//! retrieval and text extraction failures are fatal; a reasoning failure only
//! makes the semantic verdict unavailable. Each run reads the document at most
//! once, calls the reasoning collaborator at most once and writes one result.
//!
//! A record that already has a stored result is answered from the store: the
//! same declared quantity replays the stored result, a different one is a
//! conflict.

use dqv_common::config::MatchingConfig;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::field_locator::FieldLocator;
use super::number_extractor::NumberExtractor;
use super::tolerance_matcher::ToleranceMatcher;
use crate::collaborators::{DocumentStore, TextExtractor};
use crate::contextual::{prompt::truncate_chars, ContextualRequest, ContextualValidator};
use crate::db::{self, StoredResult};
use crate::error::ValidationError;
use crate::models::{
    DeterministicVerdict, Outcome, SemanticVerdict, ValidationRequest, ValidationResult,
};

/// Engine settings, fixed at construction
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub matching: MatchingConfig,
    pub storage_timeout: Duration,
    pub ocr_timeout: Duration,
    pub reasoning_timeout: Duration,
    /// Characters of extracted text kept in the result
    pub preview_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matching: MatchingConfig::default(),
            storage_timeout: Duration::from_secs(30),
            ocr_timeout: Duration::from_secs(60),
            reasoning_timeout: Duration::from_secs(60),
            preview_chars: 500,
        }
    }
}

/// Per-request validation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    TextRetrieved,
    DeterministicDone,
    SemanticAttempted,
    Merged,
    Complete,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "RECEIVED",
            Stage::TextRetrieved => "TEXT_RETRIEVED",
            Stage::DeterministicDone => "DETERMINISTIC_DONE",
            Stage::SemanticAttempted => "SEMANTIC_ATTEMPTED",
            Stage::Merged => "MERGED",
            Stage::Complete => "COMPLETE",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Final verdict fields derived from the two verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedVerdict {
    pub final_passed: bool,
    pub final_confidence: u8,
    pub disagreement: bool,
}

/// Merge rule
///
/// An available semantic verdict with a defined `is_valid` decides the
/// outcome and supplies the confidence. Otherwise the deterministic match
/// decides, with confidence 100 for a match and 0 for none. A semantic
/// verdict contradicting the deterministic match is flagged, never hidden.
pub fn merge_verdicts(
    deterministic: &DeterministicVerdict,
    semantic: &SemanticVerdict,
) -> MergedVerdict {
    match (semantic.available, semantic.is_valid) {
        (true, Some(is_valid)) => MergedVerdict {
            final_passed: is_valid,
            final_confidence: semantic.confidence.unwrap_or(0).min(100),
            disagreement: is_valid != deterministic.matched,
        },
        _ => MergedVerdict {
            final_passed: deterministic.matched,
            final_confidence: if deterministic.matched { 100 } else { 0 },
            disagreement: false,
        },
    }
}

/// A completed (or replayed) validation
#[derive(Debug, Clone)]
pub struct ValidationRun {
    pub result: ValidationResult,
    /// Persisted JSON, byte-for-byte
    pub result_json: String,
    /// Answered from the store without reprocessing
    pub replayed: bool,
}

/// Structure-only analysis output
#[derive(Debug, Clone)]
pub struct StructureAnalysis {
    pub blob_name: String,
    pub document_structure: serde_json::Value,
    pub text_preview: String,
}

/// Reachability of the external collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollaboratorHealth {
    pub storage_reachable: bool,
    pub ocr_reachable: bool,
    pub reasoning_reachable: bool,
    pub reasoning_enabled: bool,
}

struct RetrievedText {
    text: String,
    digest: String,
}

/// Validation orchestrator service
pub struct ValidationOrchestrator {
    config: EngineConfig,
    extractor: NumberExtractor,
    locator: FieldLocator,
    matcher: ToleranceMatcher,
    store: Arc<dyn DocumentStore>,
    ocr: Arc<dyn TextExtractor>,
    reasoning: Arc<dyn ContextualValidator>,
    db: SqlitePool,
}

impl ValidationOrchestrator {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn DocumentStore>,
        ocr: Arc<dyn TextExtractor>,
        reasoning: Arc<dyn ContextualValidator>,
        db: SqlitePool,
    ) -> Self {
        let extractor = NumberExtractor::new(config.matching.ambiguous_separator);
        Self {
            extractor,
            locator: FieldLocator::new(extractor),
            matcher: ToleranceMatcher::new(config.matching.clone()),
            config,
            store,
            ocr,
            reasoning,
            db,
        }
    }

    pub fn reasoning_provider(&self) -> &'static str {
        self.reasoning.name()
    }

    /// Run one validation to completion
    pub async fn validate(
        &self,
        request: ValidationRequest,
    ) -> Result<ValidationRun, ValidationError> {
        let record_id = request.record_id();
        let blob_name = request.document_reference();
        let declared = request.declared_quantity();
        let mut stage = Stage::Received;

        info!(record_id, blob_name, declared = %declared, "Validation received");

        if let Some(existing) = self.find_stored(record_id).await? {
            return replay(existing, &request);
        }

        let retrieved = match self.retrieve_text(blob_name).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                transition(record_id, &mut stage, Stage::Failed);
                error!(record_id, blob_name, error = %e, "Validation failed");
                return Err(e);
            }
        };
        transition(record_id, &mut stage, Stage::TextRetrieved);

        let deterministic = self.deterministic_verdict(declared, &retrieved.text);
        debug!(
            record_id,
            candidates = deterministic.candidates.len(),
            matched = deterministic.matched,
            "Deterministic verdict"
        );
        transition(record_id, &mut stage, Stage::DeterministicDone);

        let semantic = self
            .semantic_verdict(record_id, declared, &retrieved.text, &deterministic)
            .await;
        transition(record_id, &mut stage, Stage::SemanticAttempted);

        let merged = merge_verdicts(&deterministic, &semantic);
        if merged.disagreement {
            warn!(
                record_id,
                deterministic_matched = deterministic.matched,
                semantic_valid = ?semantic.is_valid,
                "Deterministic and semantic verdicts disagree"
            );
        }
        transition(record_id, &mut stage, Stage::Merged);

        let result = ValidationResult {
            record_id: record_id.to_string(),
            declared_quantity: declared,
            blob_name: blob_name.to_string(),
            document_digest: retrieved.digest,
            text_preview: truncate_chars(&retrieved.text, self.config.preview_chars).to_string(),
            remarks: remarks(declared, &deterministic, &semantic, &merged),
            deterministic,
            semantic,
            final_passed: merged.final_passed,
            final_confidence: merged.final_confidence,
            outcome: if merged.final_passed {
                Outcome::Passed
            } else {
                Outcome::Failed
            },
            disagreement: merged.disagreement,
            processed_at: dqv_common::time::now(),
        };

        let result_json = serde_json::to_string(&result).map_err(|e| {
            transition(record_id, &mut stage, Stage::Failed);
            ValidationError::Persistence(format!("Failed to serialize result: {}", e))
        })?;

        match db::insert_result(&self.db, &result, &result_json).await {
            Ok(true) => {
                transition(record_id, &mut stage, Stage::Complete);
                info!(
                    record_id,
                    final_passed = result.final_passed,
                    final_confidence = result.final_confidence,
                    semantic_available = result.semantic.available,
                    "Validation complete"
                );
                Ok(ValidationRun {
                    result,
                    result_json,
                    replayed: false,
                })
            }
            Ok(false) => {
                // A concurrent request for the same record stored first
                let existing = self.find_stored(record_id).await?.ok_or_else(|| {
                    ValidationError::Persistence(format!(
                        "Result for {} vanished after insert conflict",
                        record_id
                    ))
                })?;
                replay(existing, &request)
            }
            Err(e) => {
                transition(record_id, &mut stage, Stage::Failed);
                error!(record_id, error = %e, "Failed to persist result");
                Err(ValidationError::Persistence(e.to_string()))
            }
        }
    }

    /// Extractor + field locator + matcher; pure
    pub fn deterministic_verdict(&self, declared: Decimal, text: &str) -> DeterministicVerdict {
        let candidates = self.extractor.extract(text);
        let labeled_value = self.locator.locate(text).map(|field| field.value);
        self.matcher.evaluate(declared, candidates, labeled_value)
    }

    /// Structure-only analysis of a stored document; nothing is persisted
    pub async fn analyze_structure(
        &self,
        blob_name: &str,
    ) -> Result<StructureAnalysis, ValidationError> {
        let blob_name = blob_name.trim();
        if blob_name.is_empty() {
            return Err(ValidationError::InvalidRequest(
                "blob_name must not be empty".to_string(),
            ));
        }
        if !self.reasoning.is_enabled() {
            return Err(ValidationError::ReasoningUnavailable(
                "no reasoning provider configured".to_string(),
            ));
        }

        let retrieved = self.retrieve_text(blob_name).await?;

        let document_structure = match timeout(
            self.config.reasoning_timeout,
            self.reasoning.describe_structure(&retrieved.text),
        )
        .await
        {
            Ok(Ok(structure)) => structure,
            Ok(Err(e)) => return Err(ValidationError::ReasoningUnavailable(e.to_string())),
            Err(_) => {
                return Err(ValidationError::ReasoningUnavailable(format!(
                    "structure analysis timed out after {}s",
                    self.config.reasoning_timeout.as_secs()
                )))
            }
        };

        Ok(StructureAnalysis {
            blob_name: blob_name.to_string(),
            document_structure,
            text_preview: truncate_chars(&retrieved.text, self.config.preview_chars).to_string(),
        })
    }

    /// Persisted result JSON for a record, verbatim
    pub async fn stored_result(&self, record_id: &str) -> Result<Option<String>, ValidationError> {
        Ok(self.find_stored(record_id).await?.map(|s| s.result_json))
    }

    /// Probe every collaborator concurrently
    pub async fn collaborator_health(&self) -> CollaboratorHealth {
        let (storage_reachable, ocr_reachable, reasoning_reachable) =
            tokio::join!(self.store.ping(), self.ocr.ping(), self.reasoning.ping());
        CollaboratorHealth {
            storage_reachable,
            ocr_reachable,
            reasoning_reachable,
            reasoning_enabled: self.reasoning.is_enabled(),
        }
    }

    async fn find_stored(&self, record_id: &str) -> Result<Option<StoredResult>, ValidationError> {
        db::find_result(&self.db, record_id)
            .await
            .map_err(|e| ValidationError::Persistence(e.to_string()))
    }

    async fn retrieve_text(&self, blob_name: &str) -> Result<RetrievedText, ValidationError> {
        let document = timeout(self.config.storage_timeout, self.store.read(blob_name))
            .await
            .map_err(|_| {
                ValidationError::DocumentUnavailable(format!(
                    "{}: storage read timed out after {}s",
                    blob_name,
                    self.config.storage_timeout.as_secs()
                ))
            })?
            .map_err(|e| ValidationError::DocumentUnavailable(e.to_string()))?;

        let digest = format!("{:x}", Sha256::digest(&document));
        debug!(blob_name, bytes = document.len(), %digest, "Document retrieved");

        let text = timeout(self.config.ocr_timeout, self.ocr.extract(document))
            .await
            .map_err(|_| {
                ValidationError::ExtractionFailed(format!(
                    "{}: text extraction timed out after {}s",
                    blob_name,
                    self.config.ocr_timeout.as_secs()
                ))
            })?
            .map_err(|e| ValidationError::ExtractionFailed(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(ValidationError::ExtractionFailed(format!(
                "{}: no text extracted",
                blob_name
            )));
        }

        Ok(RetrievedText { text, digest })
    }

    async fn semantic_verdict(
        &self,
        record_id: &str,
        declared: Decimal,
        text: &str,
        deterministic: &DeterministicVerdict,
    ) -> SemanticVerdict {
        if !self.reasoning.is_enabled() {
            debug!(record_id, "Reasoning provider disabled, skipping semantic check");
            return SemanticVerdict::unavailable();
        }

        let request = ContextualRequest {
            document_text: text,
            declared_quantity: declared,
            candidates: &deterministic.candidates,
            labeled_value: deterministic.labeled_value,
        };

        match timeout(self.config.reasoning_timeout, self.reasoning.validate(&request)).await {
            Ok(Ok(judgment)) => {
                debug!(
                    record_id,
                    is_valid = judgment.is_valid,
                    confidence = judgment.confidence,
                    "Semantic verdict"
                );
                judgment.into_verdict()
            }
            Ok(Err(e)) => {
                warn!(
                    record_id,
                    provider = self.reasoning.name(),
                    error = %e,
                    "Semantic validation unavailable"
                );
                SemanticVerdict::unavailable()
            }
            Err(_) => {
                warn!(
                    record_id,
                    provider = self.reasoning.name(),
                    timeout_secs = self.config.reasoning_timeout.as_secs(),
                    "Semantic validation timed out"
                );
                SemanticVerdict::unavailable()
            }
        }
    }
}

fn transition(record_id: &str, stage: &mut Stage, next: Stage) {
    debug!(record_id, from = %stage, to = %next, "Stage transition");
    *stage = next;
}

fn replay(existing: StoredResult, request: &ValidationRequest) -> Result<ValidationRun, ValidationError> {
    if !existing.matches_quantity(request.declared_quantity()) {
        warn!(
            record_id = request.record_id(),
            stored = %existing.declared_quantity,
            requested = %request.declared_quantity(),
            "Declared quantity differs from stored result"
        );
        return Err(ValidationError::Conflict(format!(
            "record {} was already validated with declared quantity {}",
            existing.record_id, existing.declared_quantity
        )));
    }

    info!(record_id = request.record_id(), "Returning stored result");
    let result_json = existing.result_json.clone();
    let result = existing
        .into_result()
        .map_err(|e| ValidationError::Persistence(e.to_string()))?;

    Ok(ValidationRun {
        result,
        result_json,
        replayed: true,
    })
}

/// Human-readable explanation stored with every result
fn remarks(
    declared: Decimal,
    deterministic: &DeterministicVerdict,
    semantic: &SemanticVerdict,
    merged: &MergedVerdict,
) -> String {
    if merged.disagreement {
        let reasoning = semantic
            .reasoning
            .as_deref()
            .unwrap_or("no reasoning given");
        let verdict = if merged.final_passed { "accepted" } else { "rejected" };
        return format!(
            "Semantic check {} declared quantity {} against the pattern match: {}",
            verdict, declared, reasoning
        );
    }

    match (deterministic.matched_value, deterministic.labeled_value) {
        (Some(matched), Some(labeled))
            if matched
                .checked_sub(labeled)
                .map_or(true, |delta| delta.abs() > deterministic.tolerance_used) =>
        {
            format!(
                "Declared quantity {} found in document as {}, but the labeled discharged quantity is {}",
                declared, matched, labeled
            )
        }
        (Some(matched), _) => format!("Declared quantity {} found in document as {}", declared, matched),
        (None, Some(labeled)) => format!(
            "Declared quantity {} does not match the labeled discharged quantity {}",
            declared, labeled
        ),
        (None, None) => format!(
            "Declared quantity {} not found in document; no discharged-quantity label located; {} numeric values extracted",
            declared,
            deterministic.candidates.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic(matched: bool) -> DeterministicVerdict {
        DeterministicVerdict {
            matched,
            matched_value: matched.then(|| Decimal::from(5)),
            candidates: Vec::new(),
            tolerance_used: Decimal::new(1, 2),
            labeled_value: None,
        }
    }

    fn semantic(is_valid: bool, confidence: u8) -> SemanticVerdict {
        SemanticVerdict {
            available: true,
            is_valid: Some(is_valid),
            matched_value: None,
            confidence: Some(confidence),
            reasoning: Some("labeled field".to_string()),
            field_location_hint: None,
        }
    }

    #[test]
    fn test_merge_without_semantic_uses_deterministic() {
        let merged = merge_verdicts(&deterministic(true), &SemanticVerdict::unavailable());
        assert_eq!(
            merged,
            MergedVerdict {
                final_passed: true,
                final_confidence: 100,
                disagreement: false
            }
        );

        let merged = merge_verdicts(&deterministic(false), &SemanticVerdict::unavailable());
        assert!(!merged.final_passed);
        assert_eq!(merged.final_confidence, 0);
    }

    #[test]
    fn test_merge_semantic_decides_when_available() {
        let merged = merge_verdicts(&deterministic(true), &semantic(true, 88));
        assert!(merged.final_passed);
        assert_eq!(merged.final_confidence, 88);
        assert!(!merged.disagreement);
    }

    #[test]
    fn test_merge_flags_disagreement() {
        let merged = merge_verdicts(&deterministic(true), &semantic(false, 70));
        assert!(!merged.final_passed);
        assert_eq!(merged.final_confidence, 70);
        assert!(merged.disagreement);

        let merged = merge_verdicts(&deterministic(false), &semantic(true, 90));
        assert!(merged.final_passed);
        assert!(merged.disagreement);
    }

    #[test]
    fn test_available_verdict_without_is_valid_falls_back() {
        let verdict = SemanticVerdict {
            is_valid: None,
            ..semantic(true, 90)
        };
        let merged = merge_verdicts(&deterministic(true), &verdict);
        assert_eq!(merged.final_confidence, 100);
        assert!(!merged.disagreement);
    }

    #[test]
    fn test_remarks_describe_outcome() {
        let det = deterministic(true);
        let sem = SemanticVerdict::unavailable();
        let merged = merge_verdicts(&det, &sem);
        assert_eq!(
            remarks(Decimal::from(5), &det, &sem, &merged),
            "Declared quantity 5 found in document as 5"
        );

        let det = DeterministicVerdict {
            labeled_value: Some(Decimal::from(9)),
            ..deterministic(false)
        };
        let merged = merge_verdicts(&det, &sem);
        assert!(remarks(Decimal::from(5), &det, &sem, &merged)
            .contains("labeled discharged quantity 9"));

        let sem = semantic(false, 60);
        let det = deterministic(true);
        let merged = merge_verdicts(&det, &sem);
        assert!(remarks(Decimal::from(5), &det, &sem, &merged).starts_with("Semantic check rejected"));
    }

    #[test]
    fn test_remarks_with_extreme_labeled_value() {
        let det = DeterministicVerdict {
            matched: true,
            matched_value: Some(Decimal::MIN),
            labeled_value: Some(Decimal::MAX),
            ..deterministic(true)
        };
        let sem = SemanticVerdict::unavailable();
        let merged = merge_verdicts(&det, &sem);
        assert!(remarks(Decimal::MIN, &det, &sem, &merged)
            .contains("but the labeled discharged quantity is 79228162514264337593543950335"));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::DeterministicDone.to_string(), "DETERMINISTIC_DONE");
        assert_eq!(Stage::Failed.to_string(), "FAILED");
    }
}
