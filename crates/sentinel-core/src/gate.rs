//! Gate aggregator: the fold from per-resource verdicts to one decision.
//!
//! `aggregate` is pure and order-insensitive. `ERROR` counts exactly like
//! `REJECTED` towards `block`: a resource that could not be verified must
//! never pass silently.

use sentinel_contracts::{
    gate::{GateDecision, GateEntry},
    verdict::{Outcome, Verdict},
};

/// Fold the complete verdict set of a run into a `GateDecision`.
///
/// Callers must pass every verdict of the run. Calling this on a partial set
/// would let pending resources count as passed.
pub fn aggregate(verdicts: &[Verdict]) -> GateDecision {
    let mut approved_count = 0;
    let mut rejected_count = 0;
    let mut error_count = 0;

    let mut entries: Vec<GateEntry> = verdicts
        .iter()
        .map(|v| {
            match v.outcome() {
                Outcome::Approved => approved_count += 1,
                Outcome::Rejected => rejected_count += 1,
                Outcome::Error => error_count += 1,
            }
            GateEntry {
                resource_id: v.resource_id().clone(),
                outcome: v.outcome(),
                risk_title: match v.outcome() {
                    Outcome::Rejected => v.risk_title().map(str::to_string),
                    _ => None,
                },
                error_kind: v.error_kind(),
            }
        })
        .collect();

    entries.sort();

    GateDecision {
        total: verdicts.len(),
        approved_count,
        rejected_count,
        error_count,
        block: rejected_count + error_count > 0,
        entries,
    }
}
