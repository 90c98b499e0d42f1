//! Audit records: what the audit sink persists for each verdict.
//!
//! A `VerdictRecord` is a flattened, display-ready copy of one verdict plus
//! run metadata. The dashboard side reads these records and may flip
//! `view_state` to `ARCHIVED`; the scanner never does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    resource::{ResourceId, RunId},
    verdict::{ErrorKind, Outcome, Verdict},
};

/// Whether a record is still shown as an active alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewState {
    #[default]
    Active,
    Archived,
}

impl ViewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewState::Active => "ACTIVE",
            ViewState::Archived => "ARCHIVED",
        }
    }
}

/// Run-wide tags stamped onto every record of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    pub run_id: RunId,
    /// Resource category tag (e.g. "IAC" for pipeline scans).
    pub category: String,
    /// Where the scan ran (e.g. "github-actions", "cli").
    pub origin: String,
}

impl RecordContext {
    pub fn new(category: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            category: category.into(),
            origin: origin.into(),
        }
    }
}

/// One upsert into the audit store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    /// Unique per run and resource: `"{run_id}-{resource_id}"`.
    pub record_id: String,
    pub resource_id: ResourceId,
    pub event_time: DateTime<Utc>,
    pub category: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    pub origin: String,
    /// Serialized copy of the parsed backend verdict ("{}" when none).
    pub analysis_json: String,
    #[serde(default)]
    pub view_state: ViewState,
}

impl VerdictRecord {
    /// Build the record for `verdict` within the run described by `ctx`.
    pub fn from_verdict(verdict: &Verdict, ctx: &RecordContext, event_time: DateTime<Utc>) -> Self {
        let analysis_json = verdict
            .analysis()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "{}".to_string());

        Self {
            record_id: format!("{}-{}", ctx.run_id, verdict.resource_id()),
            resource_id: verdict.resource_id().clone(),
            event_time,
            category: ctx.category.clone(),
            outcome: verdict.outcome(),
            error_kind: verdict.error_kind(),
            risk_title: verdict.risk_title().map(str::to_string),
            detail: verdict.detail().map(str::to_string),
            remediation: verdict.remediation().map(str::to_string),
            origin: ctx.origin.clone(),
            analysis_json,
            view_state: ViewState::Active,
        }
    }
}
