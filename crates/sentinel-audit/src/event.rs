//! Ledger entries.
//!
//! Every mutation of an audit table appends one `LedgerEvent`. The event
//! commits to the mutated record's content through `record_digest`, and to
//! the whole history before it through `prev_hash`.

use serde::{Deserialize, Serialize};

/// What a ledger event did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerAction {
    /// A record was inserted or replaced.
    Upsert,
    /// A record's view state moved to `ARCHIVED`.
    Archive,
    /// Every record was removed.
    Clear,
}

impl LedgerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerAction::Upsert => "UPSERT",
            LedgerAction::Archive => "ARCHIVE",
            LedgerAction::Clear => "CLEAR",
        }
    }
}

/// One entry in the SHA-256 hash chain of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the ledger, starting at 0.
    pub sequence: u64,

    pub action: LedgerAction,

    /// The record touched, or [`LedgerEvent::ALL_RECORDS`] for a clear.
    pub record_id: String,

    /// SHA-256 (hex) of the record as stored after the mutation. Empty for
    /// a clear, which leaves no record behind.
    pub record_digest: String,

    /// `this_hash` of the previous event, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// SHA-256 (hex) over this event's fields and `prev_hash`.
    pub this_hash: String,
}

impl LedgerEvent {
    /// `prev_hash` of the first event in every ledger: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    /// `record_id` of events that affect the whole table.
    pub const ALL_RECORDS: &'static str = "*";
}
