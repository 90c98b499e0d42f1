//! Verdict extractor: free-form backend text → one JSON object.
//!
//! Precedence is fixed and each stage is independently testable:
//!
//! 1. Strip a markdown code fence at the start/end of the text.
//! 2. Parse what remains directly as a JSON object (fast path).
//! 3. Otherwise parse the span of the original text from the first `{` to
//!    the last `}`.
//! 4. Otherwise the response is malformed.
//!
//! No repair is attempted. A reply with broken JSON is reported as such
//! rather than guessed at, since a guess could hide a real rejection.

use serde_json::{Map, Value};
use thiserror::Error;

/// Why no object could be recovered. `Display` is the user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("response is empty")]
    Empty,

    #[error("no JSON object found in response")]
    NoObject,

    #[error("embedded JSON object does not parse: {reason}")]
    Unparseable { reason: String },
}

/// Which stage recovered the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPath {
    Direct,
    BracketScan,
}

/// A recovered object and the exact text span it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<'a> {
    pub object: Map<String, Value>,
    pub source: &'a str,
    pub path: ExtractionPath,
}

/// Remove a surrounding markdown code fence (```` ``` ```` or ```` ```json ````).
///
/// Only the very start and end of the trimmed text are considered; fences in
/// the middle of prose are left for the bracket scan to skip over.
pub fn strip_fences(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.split_once('\n') {
            // The opening line is dropped only when it holds nothing but a
            // language tag, so an object starting on that line survives.
            Some((tag, after)) if is_language_tag(tag) => after,
            Some(_) => rest,
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }

    body.trim()
}

fn is_language_tag(line: &str) -> bool {
    line.trim().chars().all(|c| c.is_ascii_alphanumeric())
}

/// Parse `text` as a JSON object, rejecting any other JSON value.
fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected an object, found {}", json_type(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Stage 3 on its own: parse the outermost `{ ... }` span of `text`.
///
/// Nested braces inside the real object are preserved because the span runs
/// from the first `{` to the last `}`, not to the first matching pair.
pub fn bracket_scan(text: &str) -> Result<Extracted<'_>, ExtractError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(ExtractError::NoObject);
    };
    if end < start {
        return Err(ExtractError::NoObject);
    }

    let span = &text[start..=end];
    parse_object(span)
        .map(|object| Extracted {
            object,
            source: span,
            path: ExtractionPath::BracketScan,
        })
        .map_err(|reason| ExtractError::Unparseable { reason })
}

/// Recover one JSON object from raw backend text.
pub fn extract(text: &str) -> Result<Extracted<'_>, ExtractError> {
    let body = strip_fences(text);
    if body.is_empty() {
        return Err(ExtractError::Empty);
    }

    if let Ok(object) = parse_object(body) {
        return Ok(Extracted {
            object,
            source: body,
            path: ExtractionPath::Direct,
        });
    }

    bracket_scan(text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
