//! Fail-closed parsing of reasoning collaborator output
//!
//! Models wrap JSON in prose or code fences often enough that the first JSON
//! object in the reply is used, wherever it sits. `is_valid` and `confidence`
//! are required; a reply missing either is rejected rather than guessed at.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use super::{ContextualError, SemanticJudgment};
use crate::models::FormatTag;
use crate::services::number_extractor::NumberExtractor;

/// Parse a validation judgment from raw completion text
pub fn parse_judgment(content: &str) -> Result<SemanticJudgment, ContextualError> {
    let object = first_json_object(content).ok_or_else(|| {
        ContextualError::UnparsableResponse("no JSON object in response".to_string())
    })?;

    let is_valid = object
        .get("is_valid")
        .and_then(read_bool)
        .ok_or_else(|| {
            ContextualError::UnparsableResponse("missing or invalid is_valid".to_string())
        })?;

    let confidence = object
        .get("confidence")
        .and_then(read_confidence)
        .ok_or_else(|| {
            ContextualError::UnparsableResponse("missing or invalid confidence".to_string())
        })?;

    Ok(SemanticJudgment {
        is_valid,
        matched_value: object.get("matched_value").and_then(read_decimal),
        confidence,
        reasoning: read_text(object.get("reasoning")),
        field_location: read_text(object.get("field_location")),
    })
}

/// Parse a structure description; any JSON object is accepted
pub fn parse_structure(content: &str) -> Result<Value, ContextualError> {
    first_json_object(content)
        .map(Value::Object)
        .ok_or_else(|| ContextualError::UnparsableResponse("no JSON object in response".to_string()))
}

fn first_json_object(content: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(content.trim()) {
        return Some(map);
    }

    let bytes = content.as_bytes();
    let mut search_from = 0;
    while let Some(relative) = content[search_from..].find('{') {
        let start = search_from + relative;
        if let Some(end) = balanced_object_end(bytes, start) {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&content[start..=end]) {
                return Some(map);
            }
        }
        search_from = start + 1;
    }

    None
}

/// Index of the `}` closing the object opened at `start`, honoring strings
fn balanced_object_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

fn read_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn read_confidence(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.clamp(0.0, 100.0).round() as u8)
}

fn read_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => NumberExtractor::default()
            .extract(s)
            .into_iter()
            .find(|c| c.format_tag != FormatTag::DateLike)
            .map(|c| c.parsed_value),
        _ => None,
    }
}

fn read_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}
