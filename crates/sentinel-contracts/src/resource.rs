//! Resource identity and the request/response types that flow through a scan.
//!
//! A `ResourceDescriptor` is immutable once loaded. The scanner turns it into
//! exactly one `AnalysisRequest`, and the backend answers with one
//! `RawResponse` that is consumed once by the interpreter.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of one infrastructure unit (e.g. "sg-1", "main.tf.json").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a single pipeline run.
///
/// Every audit record written during the run is keyed by this id plus the
/// resource id, so re-scans never overwrite earlier records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    /// Create a new, unique run ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One infrastructure unit as loaded from an IaC document.
///
/// The body is opaque: the pipeline never inspects it beyond reading an `id`
/// field. Rule discovery is the backend's job.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    id: ResourceId,
    origin: String,
    body: Value,
}

impl ResourceDescriptor {
    /// Build a descriptor, taking the id from the body's `id` field when it is
    /// a non-empty string or a number, and from `fallback_id` otherwise.
    pub fn new(body: Value, origin: impl Into<String>, fallback_id: impl Into<String>) -> Self {
        let id = match body.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => fallback_id.into(),
        };
        Self {
            id: ResourceId(id),
            origin: origin.into(),
            body,
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Path (or other locator) the descriptor was loaded from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Replace the id. Used by the loader to keep ids unique within a run.
    pub fn with_id(self, id: ResourceId) -> Self {
        Self { id, ..self }
    }
}

/// The bounded natural-language request sent to the backend for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    resource_id: ResourceId,
    prompt: String,
}

impl AnalysisRequest {
    pub fn new(resource_id: ResourceId, prompt: String) -> Self {
        Self { resource_id, prompt }
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// The backend's text payload, of unknown internal structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse(pub String);

impl RawResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }

    /// A short prefix of the text, safe to put in logs.
    pub fn excerpt(&self, max_chars: usize) -> String {
        excerpt(&self.0, max_chars)
    }
}

/// Truncate `text` to at most `max_chars` characters, marking the cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
