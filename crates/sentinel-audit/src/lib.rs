//! # sentinel-audit
//!
//! The verdict audit store for the Sentinel IaC gate.
//!
//! ## Overview
//!
//! Records are keyed by `record_id` and upserted once per resource per run.
//! Every mutation (upsert, archive, clear) also appends a `LedgerEvent` that
//! links to the previous event via its SHA-256 hash and commits to the
//! mutated record's digest. Editing a stored record or any ledger entry is
//! detected by `verify_integrity`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sentinel_audit::{FileAuditStore, RecordFilter};
//! use sentinel_core::traits::AuditSink;
//!
//! let store = FileAuditStore::open(Path::new(".sentinel"), "SentinelMonitor")?;
//! store.upsert(&record)?;
//! store.finalize(&record_context.run_id)?; // writes the buffered upserts
//! assert!(store.verify_integrity());
//! let recent = store.query(&RecordFilter { limit: Some(10), ..Default::default() })?;
//! ```

pub mod chain;
pub mod event;
pub mod file;
pub mod memory;
pub mod table;

pub use chain::{hash_event, record_digest, verify_chain, verify_records};
pub use event::{LedgerAction, LedgerEvent};
pub use file::{table_path, FileAuditStore};
pub use memory::InMemoryAuditSink;
pub use table::{AuditTable, RecordFilter};

// ── Tests ─────────────────────────────────────────────────────────────────────
