//! The audit table: records keyed by `record_id` plus their ledger.
//!
//! `AuditTable` is plain data with the mutation rules; the sinks add locking
//! and (for the file store) persistence on top.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    record::{VerdictRecord, ViewState},
};

use crate::{
    chain::{hash_event, record_digest, verify_records},
    event::{LedgerAction, LedgerEvent},
};

/// Filters for reading records back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub category: Option<String>,
    pub view_state: Option<ViewState>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    fn matches(&self, record: &VerdictRecord) -> bool {
        self.category.as_ref().map_or(true, |c| record.category == *c)
            && self.view_state.map_or(true, |v| record.view_state == v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTable {
    pub name: String,
    #[serde(default)]
    pub records: BTreeMap<String, VerdictRecord>,
    #[serde(default)]
    pub ledger: Vec<LedgerEvent>,
}

impl AuditTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: BTreeMap::new(),
            ledger: Vec::new(),
        }
    }

    /// Insert or replace the record stored under `record.record_id`.
    pub fn upsert(&mut self, record: &VerdictRecord) -> SentinelResult<()> {
        let digest = record_digest(record)?;
        self.records.insert(record.record_id.clone(), record.clone());
        self.append(LedgerAction::Upsert, &record.record_id, digest);
        Ok(())
    }

    /// Move a record to `ARCHIVED` and return the updated copy.
    ///
    /// Archiving an already archived record is a no-op and appends nothing.
    pub fn archive(&mut self, record_id: &str) -> SentinelResult<VerdictRecord> {
        let current = self
            .records
            .get(record_id)
            .ok_or_else(|| SentinelError::RecordNotFound {
                reason: format!("no audit record with id '{record_id}'"),
            })?;
        if current.view_state == ViewState::Archived {
            return Ok(current.clone());
        }

        let mut updated = current.clone();
        updated.view_state = ViewState::Archived;
        let digest = record_digest(&updated)?;
        self.records.insert(record_id.to_string(), updated.clone());
        self.append(LedgerAction::Archive, record_id, digest);
        Ok(updated)
    }

    /// Remove every record. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        self.append(LedgerAction::Clear, LedgerEvent::ALL_RECORDS, String::new());
        removed
    }

    /// Matching records, newest `event_time` first (ties by `record_id`).
    pub fn query(&self, filter: &RecordFilter) -> Vec<VerdictRecord> {
        let mut matching: Vec<&VerdictRecord> =
            self.records.values().filter(|r| filter.matches(r)).collect();
        matching.sort_by(|a, b| {
            b.event_time
                .cmp(&a.event_time)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        matching
            .into_iter()
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn get(&self, record_id: &str) -> Option<&VerdictRecord> {
        self.records.get(record_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `this_hash` of the newest ledger event, or the genesis hash.
    pub fn terminal_hash(&self) -> &str {
        self.ledger
            .last()
            .map(|e| e.this_hash.as_str())
            .unwrap_or(LedgerEvent::GENESIS_HASH)
    }

    /// Ledger chain is intact and matches the stored records.
    pub fn verify_integrity(&self) -> bool {
        verify_records(&self.ledger, &self.records)
    }

    fn append(&mut self, action: LedgerAction, record_id: &str, record_digest: String) {
        let sequence = self.ledger.len() as u64;
        let prev_hash = self.terminal_hash().to_string();
        let this_hash = hash_event(sequence, action, record_id, &record_digest, &prev_hash);
        self.ledger.push(LedgerEvent {
            sequence,
            action,
            record_id: record_id.to_string(),
            record_digest,
            prev_hash,
            this_hash,
        });
    }
}
