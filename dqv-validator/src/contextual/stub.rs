//! In-process reasoning validators
//!
//! `StubValidator` gives deterministic judgments for local mode and tests.
//! `DisabledValidator` stands in when no reasoning provider is configured.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{
    response_parser, ContextualError, ContextualRequest, ContextualValidator, SemanticJudgment,
};
use crate::models::FormatTag;

/// What the stub answers
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Valid (confidence 95) when the labeled value or a non-date candidate
    /// equals the declared quantity, otherwise invalid (confidence 30)
    Mirror,
    /// Always this judgment
    Fixed(SemanticJudgment),
    /// Run the reply text through the response parser
    Reply(String),
    /// Transport failure
    Fail(String),
    /// Sleep, then mirror
    Slow(Duration),
}

/// Deterministic reasoning validator
#[derive(Debug)]
pub struct StubValidator {
    behavior: StubBehavior,
    calls: AtomicUsize,
}

impl StubValidator {
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `validate` calls served
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn mirror(request: &ContextualRequest<'_>) -> SemanticJudgment {
        let tolerance = Decimal::new(1, 2);
        let close = |value: Decimal| {
            value
                .checked_sub(request.declared_quantity)
                .is_some_and(|delta| delta.abs() <= tolerance)
        };

        let found = request
            .labeled_value
            .filter(|v| close(*v))
            .or_else(|| {
                request
                    .candidates
                    .iter()
                    .filter(|c| c.format_tag != FormatTag::DateLike)
                    .map(|c| c.parsed_value)
                    .find(|v| close(*v))
            });

        match found {
            Some(value) => SemanticJudgment {
                is_valid: true,
                matched_value: Some(value),
                confidence: 95,
                reasoning: Some(format!(
                    "Declared quantity {} found in document",
                    request.declared_quantity
                )),
                field_location: None,
            },
            None => SemanticJudgment {
                is_valid: false,
                matched_value: request.labeled_value,
                confidence: 30,
                reasoning: Some(format!(
                    "Declared quantity {} not found in document",
                    request.declared_quantity
                )),
                field_location: None,
            },
        }
    }
}

#[async_trait]
impl ContextualValidator for StubValidator {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn validate(
        &self,
        request: &ContextualRequest<'_>,
    ) -> Result<SemanticJudgment, ContextualError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            StubBehavior::Mirror => Ok(Self::mirror(request)),
            StubBehavior::Fixed(judgment) => Ok(judgment.clone()),
            StubBehavior::Reply(content) => response_parser::parse_judgment(content),
            StubBehavior::Fail(message) => Err(ContextualError::Transport(message.clone())),
            StubBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Self::mirror(request))
            }
        }
    }

    async fn describe_structure(
        &self,
        document_text: &str,
    ) -> Result<serde_json::Value, ContextualError> {
        if let StubBehavior::Fail(message) = &self.behavior {
            return Err(ContextualError::Transport(message.clone()));
        }

        let title = document_text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default();

        Ok(json!({
            "document_type": title,
            "line_count": document_text.lines().count(),
        }))
    }
}

/// Reasoning provider placeholder; every call reports `Disabled`
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledValidator;

#[async_trait]
impl ContextualValidator for DisabledValidator {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn validate(
        &self,
        _request: &ContextualRequest<'_>,
    ) -> Result<SemanticJudgment, ContextualError> {
        Err(ContextualError::Disabled)
    }

    async fn describe_structure(
        &self,
        _document_text: &str,
    ) -> Result<serde_json::Value, ContextualError> {
        Err(ContextualError::Disabled)
    }
}
