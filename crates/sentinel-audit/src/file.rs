//! JSON-file implementation of `AuditSink`, and the store behind the
//! `history`, `archive` and `reset` commands.
//!
//! The whole table lives in `{dir}/{table}.json`. Upserts from a scan are
//! buffered in memory and written once, at `finalize` (or when the store is
//! dropped). `archive` and `clear` are written immediately. Every write goes
//! through a temporary file and a rename, so a crash leaves either the old
//! or the new table on disk, never a torn one.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, info};

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    record::VerdictRecord,
    resource::RunId,
};
use sentinel_core::traits::AuditSink;

use crate::table::{AuditTable, RecordFilter};

/// Where the table named `table_name` is stored under `dir`.
pub fn table_path(dir: &Path, table_name: &str) -> PathBuf {
    dir.join(format!("{table_name}.json"))
}

fn write_failed(path: &Path, err: impl fmt::Display) -> SentinelError {
    SentinelError::AuditWriteFailed {
        reason: format!("{}: {err}", path.display()),
    }
}

struct Buffered {
    table: AuditTable,
    /// Upserts applied in memory but not yet on disk.
    unsaved: usize,
}

pub struct FileAuditStore {
    path: PathBuf,
    state: Mutex<Buffered>,
}

impl FileAuditStore {
    /// Load the table from `dir`, or start an empty one if the file does not
    /// exist yet. Nothing is written until the first flush.
    pub fn open(dir: &Path, table_name: &str) -> SentinelResult<Self> {
        let path = table_path(dir, table_name);
        let table = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|e| SentinelError::AuditReadFailed {
                reason: format!("{}: {e}", path.display()),
            })?;
            serde_json::from_str(&text).map_err(|e| SentinelError::AuditReadFailed {
                reason: format!("{}: {e}", path.display()),
            })?
        } else {
            AuditTable::new(table_name)
        };

        debug!(path = %path.display(), records = table.len(), "audit table opened");
        Ok(Self {
            path,
            state: Mutex::new(Buffered { table, unsaved: 0 }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> SentinelResult<MutexGuard<'_, Buffered>> {
        self.state.lock().map_err(|e| SentinelError::AuditWriteFailed {
            reason: format!("audit table lock poisoned: {e}"),
        })
    }

    /// Apply `mutation` to a copy, persist the copy, then adopt it.
    ///
    /// Pending upserts are written along with the mutation.
    fn mutate<T>(
        &self,
        mutation: impl FnOnce(&mut AuditTable) -> SentinelResult<T>,
    ) -> SentinelResult<T> {
        let mut current = self.lock()?;
        let mut next = current.table.clone();
        let result = mutation(&mut next)?;
        persist(&self.path, &next)?;
        current.table = next;
        current.unsaved = 0;
        Ok(result)
    }

    pub fn snapshot(&self) -> SentinelResult<AuditTable> {
        Ok(self.lock()?.table.clone())
    }

    pub fn query(&self, filter: &RecordFilter) -> SentinelResult<Vec<VerdictRecord>> {
        Ok(self.lock()?.table.query(filter))
    }

    pub fn archive(&self, record_id: &str) -> SentinelResult<VerdictRecord> {
        self.mutate(|table| table.archive(record_id))
    }

    pub fn clear(&self) -> SentinelResult<usize> {
        self.mutate(|table| Ok(table.clear()))
    }

    pub fn verify_integrity(&self) -> bool {
        self.lock()
            .map(|state| state.table.verify_integrity())
            .unwrap_or(false)
    }
}

/// Write buffered upserts to disk. A no-op when nothing is pending.
fn flush_buffered(path: &Path, state: &mut Buffered) -> SentinelResult<()> {
    if state.unsaved == 0 {
        return Ok(());
    }
    persist(path, &state.table)?;
    debug!(path = %path.display(), upserts = state.unsaved, "audit table flushed");
    state.unsaved = 0;
    Ok(())
}

fn persist(path: &Path, table: &AuditTable) -> SentinelResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| write_failed(path, e))?;
    }
    let bytes = serde_json::to_vec_pretty(table).map_err(|e| write_failed(path, e))?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, bytes).map_err(|e| write_failed(path, e))?;
    fs::rename(&staging, path).map_err(|e| write_failed(path, e))?;
    Ok(())
}

impl Drop for FileAuditStore {
    fn drop(&mut self) {
        let Ok(state) = self.state.get_mut() else { return };
        if let Err(e) = flush_buffered(&self.path, state) {
            error!(path = %self.path.display(), error = %e, "unsaved audit records lost");
        }
    }
}

impl AuditSink for FileAuditStore {
    fn upsert(&self, record: &VerdictRecord) -> SentinelResult<()> {
        let mut current = self.lock()?;
        current.table.upsert(record)?;
        current.unsaved += 1;
        Ok(())
    }

    fn finalize(&self, run_id: &RunId) -> SentinelResult<()> {
        let mut current = self.lock()?;
        flush_buffered(&self.path, &mut current)?;
        info!(
            run_id = %run_id,
            path = %self.path.display(),
            record_count = current.table.len(),
            terminal_hash = %current.table.terminal_hash(),
            "audit run finalized"
        );
        Ok(())
    }
}
