//! Hash-chain primitives: digests, event hashing, and verification.
//!
//! Hash input layout for an event (bytes, in order):
//!   1. sequence as 8-byte little-endian
//!   2. action token as UTF-8 bytes
//!   3. record_id as UTF-8 bytes, then a 0x00 separator
//!   4. record_digest as UTF-8 bytes (64 hex chars, or empty)
//!   5. prev_hash as UTF-8 bytes (64 hex chars)

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    record::VerdictRecord,
};

use crate::event::{LedgerAction, LedgerEvent};

/// SHA-256 (hex) of the record's canonical JSON.
pub fn record_digest(record: &VerdictRecord) -> SentinelResult<String> {
    let bytes = serde_json::to_vec(record).map_err(|e| SentinelError::AuditWriteFailed {
        reason: format!("record {} is not serializable: {e}", record.record_id),
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Compute `this_hash` for an event with the given fields.
pub fn hash_event(
    sequence: u64,
    action: LedgerAction,
    record_id: &str,
    record_digest: &str,
    prev_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(action.as_str().as_bytes());
    hasher.update(record_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(record_digest.as_bytes());
    hasher.update(prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check linkage, sequence numbering, and per-event hashes.
///
/// An empty ledger is valid.
pub fn verify_chain(events: &[LedgerEvent]) -> bool {
    let mut expected_prev = LedgerEvent::GENESIS_HASH.to_string();

    for (position, event) in events.iter().enumerate() {
        if event.sequence != position as u64 || event.prev_hash != expected_prev {
            return false;
        }

        let recomputed = hash_event(
            event.sequence,
            event.action,
            &event.record_id,
            &event.record_digest,
            &event.prev_hash,
        );
        if event.this_hash != recomputed {
            return false;
        }

        expected_prev = event.this_hash.clone();
    }

    true
}

/// Replay the ledger and compare the result with the stored records.
///
/// Valid when the chain verifies and every stored record's digest equals
/// the digest of the last ledger event for its id, with no record missing
/// or unaccounted for.
pub fn verify_records(events: &[LedgerEvent], records: &BTreeMap<String, VerdictRecord>) -> bool {
    if !verify_chain(events) {
        return false;
    }

    let mut expected: BTreeMap<&str, &str> = BTreeMap::new();
    for event in events {
        match event.action {
            LedgerAction::Upsert | LedgerAction::Archive => {
                expected.insert(&event.record_id, &event.record_digest);
            }
            LedgerAction::Clear => expected.clear(),
        }
    }

    if expected.len() != records.len() {
        return false;
    }
    records.iter().all(|(record_id, record)| {
        record.record_id == *record_id
            && match (expected.get(record_id.as_str()), record_digest(record)) {
                (Some(want), Ok(got)) => *want == got,
                _ => false,
            }
    })
}
