//! Core trait definitions for the Sentinel scan pipeline.
//!
//! These three traits define the boundaries the scanner drives:
//!
//! - `VerdictBackend`: untrusted reasoning service (one call per resource)
//! - `ResponseInterpreter`: trusted parser turning raw text into a verdict
//! - `AuditSink`: trusted store receiving every verdict
//!
//! The scanner wires them together. Implementations never see each other.

use thiserror::Error;

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    record::VerdictRecord,
    resource::{AnalysisRequest, RawResponse, ResourceId, RunId},
    verdict::Verdict,
};

/// A classified failure of one backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Connection, TLS, timeout, or cancellation failure.
    #[error("{reason}")]
    Transport { reason: String },

    /// The backend answered with a non-success status code.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// Success status, but the envelope carried no usable text payload.
    #[error("unusable response envelope: {reason}")]
    Envelope { reason: String },
}

impl BackendError {
    /// Transport failures and bad statuses are transient; a broken envelope
    /// is a content problem and is never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Transport { .. } | BackendError::Status { .. })
    }
}

impl From<BackendError> for SentinelError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Envelope { .. } => SentinelError::MalformedResponse {
                reason: err.to_string(),
            },
            BackendError::Transport { .. } | BackendError::Status { .. } => {
                SentinelError::Transport {
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// The reasoning backend: a black-box text-completion service.
///
/// Implementations are **untrusted** in the sense that their output is never
/// acted on without passing through a `ResponseInterpreter`. Each call makes
/// exactly one outbound request; retry policy belongs to the scanner.
pub trait VerdictBackend: Send + Sync {
    /// Send one request and return the raw text payload.
    fn complete(&self, request: &AnalysisRequest) -> Result<RawResponse, BackendError>;
}

/// Turns backend text into a verdict.
///
/// Implementations are **trusted** and total: every input, including garbage,
/// produces a terminal `Verdict` (an `ERROR` one when nothing valid can be
/// recovered). They must never panic on malformed text.
pub trait ResponseInterpreter: Send + Sync {
    fn interpret(&self, resource_id: &ResourceId, response: &RawResponse) -> Verdict;
}

/// The audit store: receives one upsert per verdict.
///
/// Writes for distinct resources target distinct keys, so implementations
/// may be called concurrently from several workers.
pub trait AuditSink: Send + Sync {
    /// Insert or replace the record stored under `record.record_id`.
    fn upsert(&self, record: &VerdictRecord) -> SentinelResult<()>;

    /// Mark a run as complete. Implementations may flush or seal here.
    fn finalize(&self, run_id: &RunId) -> SentinelResult<()>;
}
