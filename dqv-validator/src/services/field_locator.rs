//! Labeled discharged-quantity field lookup
//!
//! Delivery and discharge documents usually carry the quantity next to a label
//! such as "Weight of Cargo Discharged". OCR output mangles spacing
//! (`WEIGHTOFCARGO DISCHARGED`) and dashes, so labels are matched loosely,
//! most specific first. The first labeled value found wins.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use super::number_extractor::NumberExtractor;
use crate::models::FormatTag;

const VALUE_CAPTURE: &str = r"\s*[:\-=]?\s*([0-9](?:[0-9,.\x{00A0} ]*[0-9])?)";

/// Label patterns in priority order
const LABELS: [&str; 8] = [
    r"W(?:EIGHT|T)\.?\s*(?:OF\s*)?CARGO\s*DISCHARGED",
    r"CARGO\s*DISCHARGED\s*(?:WEIGHT|WT|QTY|QUANTITY|VALUE|VOL(?:UME)?)\.?",
    r"DISCHARGED\s*(?:WEIGHT|WT|QTY|QUANTITY|VALUE|CARGO)\.?",
    r"(?:WEIGHT|WT|QTY|QUANTITY|VALUE)\s*(?:OF\s*)?(?:CARGO\s*)?DISCHARGED",
    r"(?:TOTAL|NET|GROSS)\s*(?:CARGO\s*)?DISCHARGED",
    r"DELIVERED\s*(?:WEIGHT|WT|QTY|QUANTITY|VALUE)\.?",
    r"(?:QUANTITY|QTY)\s*DELIVERED",
    r"DISCHARGED",
];

static LABEL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    LABELS
        .iter()
        .map(|label| {
            Regex::new(&format!("(?i)({}){}", label, VALUE_CAPTURE))
                .expect("label pattern is valid")
        })
        .collect()
});

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// A labeled quantity found in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledField {
    /// Label text as it appears (whitespace collapsed)
    pub label: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldLocator {
    extractor: NumberExtractor,
}

impl FieldLocator {
    pub fn new(extractor: NumberExtractor) -> Self {
        Self { extractor }
    }

    /// Find the labeled discharged quantity, if the document has one
    pub fn locate(&self, text: &str) -> Option<LabeledField> {
        let normalized = normalize(text);

        for pattern in LABEL_PATTERNS.iter() {
            for caps in pattern.captures_iter(&normalized) {
                let (Some(label), Some(raw)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };

                let value = self
                    .extractor
                    .extract(raw.as_str())
                    .into_iter()
                    .find(|c| c.format_tag != FormatTag::DateLike)
                    .map(|c| c.parsed_value);

                if let Some(value) = value {
                    tracing::debug!(label = label.as_str(), %value, "Located labeled quantity");
                    return Some(LabeledField {
                        label: label.as_str().to_string(),
                        value,
                    });
                }
            }
        }

        None
    }
}

/// Fold dash variants to `-` and collapse whitespace runs
fn normalize(text: &str) -> String {
    let dashes: String = text
        .chars()
        .map(|c| match c {
            '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
            other => other,
        })
        .collect();
    WHITESPACE_RUN.replace_all(&dashes, " ").into_owned()
}
