//! Context-aware secondary validation
//!
//! The reasoning collaborator decides which extracted number is the
//! discharged quantity and whether it agrees with the declared one. It sits
//! behind [`ContextualValidator`] so the orchestrator can run against the
//! Azure OpenAI adapter, a deterministic stub, or nothing at all.

pub mod azure_openai;
pub mod prompt;
pub mod response_parser;
pub mod stub;

use async_trait::async_trait;
use dqv_common::config::{ReasoningConfig, ReasoningProvider};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::{NumericCandidate, SemanticVerdict};

pub use azure_openai::AzureOpenAiValidator;
pub use stub::{DisabledValidator, StubBehavior, StubValidator};

/// Reasoning collaborator errors
///
/// None of these is fatal to a validation: the orchestrator folds every one
/// of them into an unavailable semantic verdict.
#[derive(Debug, Error)]
pub enum ContextualError {
    #[error("Reasoning provider disabled")]
    Disabled,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited after {0} retries")]
    RateLimited(u32),

    #[error("Unparsable response: {0}")]
    UnparsableResponse(String),

    #[error("Invalid reasoning configuration: {0}")]
    InvalidConfig(String),
}

/// Everything the reasoning collaborator sees about one validation
#[derive(Debug, Clone, Copy)]
pub struct ContextualRequest<'a> {
    pub document_text: &'a str,
    pub declared_quantity: Decimal,
    pub candidates: &'a [NumericCandidate],
    /// Value next to a discharged-quantity label, when one was found
    pub labeled_value: Option<Decimal>,
}

/// A parsed judgment; required fields are always present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticJudgment {
    pub is_valid: bool,
    pub matched_value: Option<Decimal>,
    /// 0..=100
    pub confidence: u8,
    pub reasoning: Option<String>,
    pub field_location: Option<String>,
}

impl SemanticJudgment {
    pub fn into_verdict(self) -> SemanticVerdict {
        SemanticVerdict {
            available: true,
            is_valid: Some(self.is_valid),
            matched_value: self.matched_value,
            confidence: Some(self.confidence.min(100)),
            reasoning: self.reasoning,
            field_location_hint: self.field_location,
        }
    }
}

/// Reasoning collaborator capability
#[async_trait]
pub trait ContextualValidator: Send + Sync {
    /// Provider identifier for logs and health output
    fn name(&self) -> &'static str;

    /// Whether this validator can produce judgments at all
    fn is_enabled(&self) -> bool {
        true
    }

    /// Judge whether the declared quantity is the document's discharged quantity
    async fn validate(
        &self,
        request: &ContextualRequest<'_>,
    ) -> Result<SemanticJudgment, ContextualError>;

    /// Structure-only analysis: a free-form JSON description, no verdict
    async fn describe_structure(
        &self,
        document_text: &str,
    ) -> Result<serde_json::Value, ContextualError>;

    /// Cheap reachability probe for health reporting
    async fn ping(&self) -> bool {
        self.is_enabled()
    }
}

/// Build the configured reasoning validator
///
/// `api_key` is the already-resolved secret (environment over TOML).
pub fn from_config(
    config: &ReasoningConfig,
    api_key: Option<String>,
    request_timeout: Duration,
) -> Result<Arc<dyn ContextualValidator>, ContextualError> {
    match config.provider {
        ReasoningProvider::AzureOpenai => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                ContextualError::InvalidConfig("reasoning.endpoint is required".to_string())
            })?;
            let api_key = api_key.ok_or_else(|| {
                ContextualError::InvalidConfig(
                    "reasoning API key is required (DQV_REASONING_API_KEY or reasoning.api_key)"
                        .to_string(),
                )
            })?;
            let validator = AzureOpenAiValidator::new(endpoint, api_key, config, request_timeout)?;
            Ok(Arc::new(validator))
        }
        ReasoningProvider::Stub => Ok(Arc::new(StubValidator::new(StubBehavior::Mirror))),
        ReasoningProvider::Disabled => Ok(Arc::new(DisabledValidator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judgment_becomes_available_verdict() {
        let verdict = SemanticJudgment {
            is_valid: true,
            matched_value: Some(Decimal::new(123456, 2)),
            confidence: 92,
            reasoning: Some("Weight of cargo discharged row".to_string()),
            field_location: None,
        }
        .into_verdict();

        assert!(verdict.available);
        assert_eq!(verdict.is_valid, Some(true));
        assert_eq!(verdict.confidence, Some(92));
    }

    #[test]
    fn test_azure_provider_requires_endpoint_and_key() {
        let mut config = ReasoningConfig {
            provider: ReasoningProvider::AzureOpenai,
            ..ReasoningConfig::default()
        };
        let err = from_config(&config, Some("k".to_string()), Duration::from_secs(1)).err();
        assert!(matches!(err, Some(ContextualError::InvalidConfig(_))));

        config.endpoint = Some("https://example.openai.azure.com".to_string());
        let err = from_config(&config, None, Duration::from_secs(1)).err();
        assert!(matches!(err, Some(ContextualError::InvalidConfig(_))));

        let validator = from_config(&config, Some("k".to_string()), Duration::from_secs(1)).unwrap();
        assert_eq!(validator.name(), "azure-openai");
    }

    #[test]
    fn test_disabled_provider() {
        let validator =
            from_config(&ReasoningConfig::default(), None, Duration::from_secs(1)).unwrap();
        assert!(!validator.is_enabled());
    }
}
