//! Run-level gate decision.
//!
//! A `GateDecision` is produced once per run by the gate aggregator, from the
//! complete set of verdicts. It is the only input to the process exit code.

use serde::{Deserialize, Serialize};

use crate::{
    resource::ResourceId,
    verdict::{ErrorKind, Outcome},
};

/// Exit code when every resource was approved.
pub const EXIT_PASS: u8 = 0;

/// Exit code when at least one resource was rejected or failed analysis.
pub const EXIT_BLOCK: u8 = 1;

/// One line of the per-resource breakdown.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GateEntry {
    pub resource_id: ResourceId,
    pub outcome: Outcome,
    /// Present for rejected resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_title: Option<String>,
    /// Present for errored resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

/// The aggregate decision over every verdict in a run.
///
/// `block` is true iff `rejected_count + error_count > 0`. `entries` is kept
/// in canonical (sorted) order so that two decisions over the same multiset
/// of verdicts compare equal regardless of arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub total: usize,
    pub approved_count: usize,
    pub rejected_count: usize,
    pub error_count: usize,
    pub block: bool,
    pub entries: Vec<GateEntry>,
}

impl GateDecision {
    /// The process exit code for this decision.
    pub fn exit_code(&self) -> u8 {
        if self.block {
            EXIT_BLOCK
        } else {
            EXIT_PASS
        }
    }

    /// Number of resources that prevent deployment.
    pub fn blocking_count(&self) -> usize {
        self.rejected_count + self.error_count
    }
}
