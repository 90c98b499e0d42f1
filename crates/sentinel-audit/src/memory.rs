//! In-memory implementation of `AuditSink`.
//!
//! Used for `--no-audit` runs and in tests. Clones share the same table, so
//! a caller can keep a handle after boxing the sink into a scanner.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    record::VerdictRecord,
    resource::RunId,
};
use sentinel_core::traits::AuditSink;

use crate::table::{AuditTable, RecordFilter};

#[derive(Clone)]
pub struct InMemoryAuditSink {
    pub(crate) table: Arc<Mutex<AuditTable>>,
}

impl InMemoryAuditSink {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table: Arc::new(Mutex::new(AuditTable::new(table_name))),
        }
    }

    fn lock(&self) -> SentinelResult<MutexGuard<'_, AuditTable>> {
        self.table.lock().map_err(|e| SentinelError::AuditWriteFailed {
            reason: format!("audit table lock poisoned: {e}"),
        })
    }

    /// A copy of the table as it stands now.
    pub fn snapshot(&self) -> SentinelResult<AuditTable> {
        Ok(self.lock()?.clone())
    }

    pub fn query(&self, filter: &RecordFilter) -> SentinelResult<Vec<VerdictRecord>> {
        Ok(self.lock()?.query(filter))
    }

    pub fn archive(&self, record_id: &str) -> SentinelResult<VerdictRecord> {
        self.lock()?.archive(record_id)
    }

    pub fn clear(&self) -> SentinelResult<usize> {
        Ok(self.lock()?.clear())
    }

    /// False when the lock is poisoned or the ledger does not verify.
    pub fn verify_integrity(&self) -> bool {
        self.lock().map(|t| t.verify_integrity()).unwrap_or(false)
    }
}

impl AuditSink for InMemoryAuditSink {
    fn upsert(&self, record: &VerdictRecord) -> SentinelResult<()> {
        self.lock()?.upsert(record)
    }

    fn finalize(&self, run_id: &RunId) -> SentinelResult<()> {
        let table = self.lock()?;
        info!(
            run_id = %run_id,
            table = %table.name,
            record_count = table.len(),
            terminal_hash = %table.terminal_hash(),
            "audit run finalized"
        );
        Ok(())
    }
}
