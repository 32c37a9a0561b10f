//! Validation services
//!
//! The extractor, field locator and matcher are pure; the orchestrator drives
//! them together with the external collaborators.

pub mod field_locator;
pub mod number_extractor;
pub mod orchestrator;
pub mod tolerance_matcher;

pub use field_locator::{FieldLocator, LabeledField};
pub use number_extractor::NumberExtractor;
pub use orchestrator::{
    merge_verdicts, CollaboratorHealth, EngineConfig, MergedVerdict, Stage, StructureAnalysis,
    ValidationOrchestrator, ValidationRun,
};
pub use tolerance_matcher::ToleranceMatcher;
