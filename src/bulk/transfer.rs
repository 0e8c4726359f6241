use anyhow::{Result, anyhow};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::staging::StagingFile;
use crate::db::identifiers::quote_all;
use crate::db::{DatabaseGateway, LoadMode, SqlValue};

/// Stages rows for several destination tables at once and bulk loads each
/// of them on demand.
///
/// Used when one source table is reshaped into several narrower ones: rows
/// are read once, split in memory, and written to one staging file per
/// destination. Files not flushed are deleted when the transfer is dropped.
/// Identity keys given to [`stage_unique`](Self::stage_unique) are kept per
/// table for the life of the transfer, across flushes.
#[derive(Debug)]
pub struct BulkTransfer {
    staging_dir: PathBuf,
    staged: Vec<StagingFile>,
    seen: HashMap<String, HashSet<String>>,
}

impl BulkTransfer {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            staged: Vec::new(),
            seen: HashMap::new(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Append a row destined for `table`
    pub fn stage_row(&mut self, table: &str, columns: &[&str], values: &[SqlValue]) -> Result<()> {
        self.staging_for(table, columns)?.stage_row(values)
    }

    /// Append a row unless a row with the same identity key was already
    /// staged for `table`; the first write wins.
    pub fn stage_unique(
        &mut self,
        table: &str,
        columns: &[&str],
        key: &str,
        values: &[SqlValue],
    ) -> Result<bool> {
        if self.seen.get(table).is_some_and(|keys| keys.contains(key)) {
            return Ok(false);
        }
        self.staging_for(table, columns)?.stage_row(values)?;
        self.seen
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string());
        Ok(true)
    }

    /// Rows currently staged for `table`
    pub fn staged_rows(&self, table: &str) -> u64 {
        self.position(table)
            .map(|idx| self.staged[idx].rows())
            .unwrap_or(0)
    }

    /// Bulk load everything staged for `table`, then delete its staging file.
    ///
    /// A table with nothing staged loads zero rows without touching the database.
    pub async fn flush(&mut self, db: &dyn DatabaseGateway, table: &str, mode: LoadMode) -> Result<u64> {
        match self.position(table) {
            Some(idx) => self.staged.remove(idx).flush(db, mode).await,
            None => Ok(0),
        }
    }

    fn position(&self, table: &str) -> Option<usize> {
        let quoted = format!("`{}`", table);
        self.staged.iter().position(|s| s.table() == quoted)
    }

    fn staging_for(&mut self, table: &str, columns: &[&str]) -> Result<&mut StagingFile> {
        let idx = match self.position(table) {
            Some(idx) => {
                let quoted = quote_all(columns)?;
                if self.staged[idx].columns() != quoted.as_slice() {
                    return Err(anyhow!(
                        "Rows for {} were already staged with columns ({}), got ({})",
                        table,
                        self.staged[idx].columns().join(", "),
                        quoted.join(", ")
                    ));
                }
                idx
            }
            None => {
                self.staged
                    .push(StagingFile::create(&self.staging_dir, table, columns)?);
                self.staged.len() - 1
            }
        };
        Ok(&mut self.staged[idx])
    }
}
