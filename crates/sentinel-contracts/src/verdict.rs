//! The canonical per-resource verdict.
//!
//! `Verdict` fields are private: the only way to build one is through the
//! constructors below, which uphold two invariants:
//!
//! - `REJECTED` always carries a non-empty `risk_title`.
//! - `ERROR` always carries an `error_kind`; non-error verdicts never do.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{SentinelError, SentinelResult},
    resource::ResourceId,
};

/// The terminal outcome of analyzing one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Approved,
    Rejected,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approved => "APPROVED",
            Outcome::Rejected => "REJECTED",
            Outcome::Error => "ERROR",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a verdict is `ERROR`.
///
/// - `ReadError` is local and deterministic; retrying cannot help.
/// - `TransportError` is transient; the caller may retry.
/// - `MalformedResponse` is not retryable with the same request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ReadError,
    TransportError,
    MalformedResponse,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ReadError => "READ_ERROR",
            ErrorKind::TransportError => "TRANSPORT_ERROR",
            ErrorKind::MalformedResponse => "MALFORMED_RESPONSE",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional textual content of a verdict.
///
/// Whitespace-only strings are treated as absent, so a verdict never carries
/// an empty title that merely looks present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Findings {
    pub risk_title: Option<String>,
    pub detail: Option<String>,
    pub remediation: Option<String>,
}

impl Findings {
    pub fn new(
        risk_title: Option<String>,
        detail: Option<String>,
        remediation: Option<String>,
    ) -> Self {
        Self {
            risk_title: clean(risk_title),
            detail: clean(detail),
            remediation: clean(remediation),
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The schema-valid outcome of analyzing one resource.
///
/// Created once per resource per run and never mutated. A re-scan produces a
/// new `Verdict`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    resource_id: ResourceId,
    outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remediation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    /// The parsed backend object this verdict was derived from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<Value>,
}

impl Verdict {
    /// The backend found no blocking risk.
    pub fn approved(resource_id: ResourceId, findings: Findings) -> Self {
        let findings = Findings::new(findings.risk_title, findings.detail, findings.remediation);
        Self {
            resource_id,
            outcome: Outcome::Approved,
            risk_title: findings.risk_title,
            detail: findings.detail,
            remediation: findings.remediation,
            error_kind: None,
            analysis: None,
        }
    }

    /// The backend found a blocking risk.
    ///
    /// Returns `MalformedResponse` when `findings` has no risk title, since a
    /// rejection that cannot say what is wrong is not a valid verdict.
    pub fn rejected(resource_id: ResourceId, findings: Findings) -> SentinelResult<Self> {
        let findings = Findings::new(findings.risk_title, findings.detail, findings.remediation);
        if findings.risk_title.is_none() {
            return Err(SentinelError::MalformedResponse {
                reason: "rejected verdict has no risk title".to_string(),
            });
        }
        Ok(Self {
            resource_id,
            outcome: Outcome::Rejected,
            risk_title: findings.risk_title,
            detail: findings.detail,
            remediation: findings.remediation,
            error_kind: None,
            analysis: None,
        })
    }

    /// The resource could not be analyzed. `reason` is kept as the detail.
    pub fn error(resource_id: ResourceId, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            resource_id,
            outcome: Outcome::Error,
            risk_title: None,
            detail: clean(Some(reason.into())),
            remediation: None,
            error_kind: Some(kind),
            analysis: None,
        }
    }

    /// Convert a pipeline error into the terminal verdict for its resource.
    pub fn from_error(resource_id: ResourceId, err: &SentinelError) -> Self {
        Self::error(resource_id, err.kind(), err.reason())
    }

    /// Attach the parsed backend object for the audit copy.
    pub fn with_analysis(self, analysis: Value) -> Self {
        Self {
            analysis: Some(analysis),
            ..self
        }
    }

    /// Same verdict with its detail replaced. Error verdicts use this to add
    /// context (e.g. attempt counts) without touching their kind.
    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        Self {
            detail: clean(Some(detail.into())),
            ..self
        }
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn risk_title(&self) -> Option<&str> {
        self.risk_title.as_deref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn remediation(&self) -> Option<&str> {
        self.remediation.as_deref()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn analysis(&self) -> Option<&Value> {
        self.analysis.as_ref()
    }

    pub fn is_approved(&self) -> bool {
        self.outcome == Outcome::Approved
    }
}
