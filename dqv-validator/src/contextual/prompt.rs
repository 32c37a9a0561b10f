//! Prompt construction for the reasoning collaborator

use super::ContextualRequest;

pub const VALIDATION_SYSTEM_PROMPT: &str = "\
You check quantities declared in an ERP system against cargo delivery and discharge documents.
Locate the discharged cargo quantity in the document. Its label varies between issuers, for example \
WEIGHT OF CARGO DISCHARGED, CARGO DISCHARGED QTY, QUANTITY DISCHARGED, TOTAL DISCHARGED, \
NET DISCHARGED or DELIVERED QTY.
Compare it with the declared quantity, allowing for formatting differences \
(1234.56, 1,234.56 and 1.234,56 are the same number) and unit labels such as MT, KG, LT or BBL.
Dates, reference numbers, vessel numbers and prices are never the quantity.
Answer with a single JSON object and nothing else.";

pub const STRUCTURE_SYSTEM_PROMPT: &str =
    "You describe the layout of delivery and shipping documents. Answer with a single JSON object.";

/// Longest prefix of `text` holding at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// User message for a validation request
pub fn validation_prompt(request: &ContextualRequest<'_>, max_chars: usize) -> String {
    let labeled = match request.labeled_value {
        Some(value) => value.to_string(),
        None => "not found, locate it yourself".to_string(),
    };
    let values: Vec<String> = request
        .candidates
        .iter()
        .map(|c| format!("{} ({})", c.parsed_value, c.raw_text))
        .collect();

    format!(
        r#"DOCUMENT TEXT:
{text}

LABELED DISCHARGED QUANTITY (pattern match): {labeled}

NUMBERS FOUND IN THE TEXT:
[{values}]

DECLARED QUANTITY: {declared}

Does the declared quantity equal the discharged quantity in the document?
Reply with this JSON object:
{{
  "is_valid": true or false,
  "matched_value": the discharged quantity as a number, or null,
  "confidence": integer from 0 to 100,
  "reasoning": short explanation,
  "field_location": the text snippet holding the value
}}"#,
        text = truncate_chars(request.document_text, max_chars),
        labeled = labeled,
        values = values.join(", "),
        declared = request.declared_quantity,
    )
}

/// User message for structure-only analysis
pub fn structure_prompt(document_text: &str, max_chars: usize) -> String {
    format!(
        "Describe this delivery document:\n\n{}\n\n\
         Report the document type or title, the delivered or discharged quantity field and its \
         value, dates, reference numbers, and material or product details as JSON fields.",
        truncate_chars(document_text, max_chars)
    )
}
