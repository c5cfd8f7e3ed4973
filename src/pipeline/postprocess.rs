//! Post-processing: turn the model's answer text into an [`ExtractionRecord`].
//!
//! Even when told to answer with JSON only, models regularly wrap the object
//! in a ```` ```json ```` fence, and sometimes type a number where a string
//! was asked for. Both are fixed here deterministically:
//!
//! 1. Trim, then strip an optional fenced code block.
//! 2. Parse as JSON; anything that is not an object is a parse failure.
//! 3. Coerce each of the six keys to string-or-absent.

use crate::error::ItemError;
use crate::output::ExtractionRecord;
use crate::prompts::FIELD_KEYS;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Parse a raw answer into a record.
pub fn parse_answer(text: &str) -> Result<ExtractionRecord, ItemError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body).map_err(|e| ItemError::ResponseParse {
        cause: e.to_string(),
    })?;

    match value {
        Value::Object(map) => Ok(record_from_map(&map)),
        other => Err(ItemError::ResponseParse {
            cause: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

// ── Rule 1: Strip fenced code block ──────────────────────────────────────────

// An info string (`json`, `javascript`, `json5`, …) is only taken as such
// when whitespace follows it, so a one-line fence such as ```` ```true``` ````
// keeps its body.
static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[A-Za-z0-9_-]+\s)?\s*(.*?)\s*```").unwrap());

/// Return the inside of the first fenced block, or the trimmed text if none.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    match RE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text,
    }
}

// ── Rule 2: Coerce values ────────────────────────────────────────────────────

fn record_from_map(map: &Map<String, Value>) -> ExtractionRecord {
    let [date, spec, size, charge_no, project, maker] =
        FIELD_KEYS.map(|key| map.get(key).and_then(coerce));
    ExtractionRecord {
        date,
        spec,
        size,
        charge_no,
        project,
        maker,
    }
}

fn coerce(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
