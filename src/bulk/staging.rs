use anyhow::{Context, Result, anyhow};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use super::format::encode_row;
use crate::db::identifiers::{quote_all, quote_identifier};
use crate::db::{BulkLoad, DatabaseGateway, LoadMode, SqlValue};

/// Rows waiting to be bulk loaded into one destination table.
///
/// Backed by a temporary file that is removed when the handle is dropped,
/// so the file never outlives the step, whether the load succeeds or not.
pub struct StagingFile {
    table: String,
    columns: Vec<String>,
    writer: BufWriter<NamedTempFile>,
    rows: u64,
}

impl std::fmt::Debug for StagingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingFile")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("path", &self.path())
            .field("rows", &self.rows)
            .finish()
    }
}

impl StagingFile {
    pub fn create(dir: &Path, table: &str, columns: &[&str]) -> Result<Self> {
        if columns.is_empty() {
            return Err(anyhow!("Staging file for '{}' needs at least one column", table));
        }
        let quoted_table = quote_identifier(table)?;
        let quoted_columns = quote_all(columns)?;

        let file = tempfile::Builder::new()
            .prefix(&format!("{}_", table))
            .suffix(".tsv")
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create staging file in {}", dir.display()))?;
        make_server_readable(file.path())?;
        debug!("Staging rows for {} in {}", table, file.path().display());

        Ok(Self {
            table: quoted_table,
            columns: quoted_columns,
            writer: BufWriter::new(file),
            rows: 0,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn path(&self) -> PathBuf {
        self.writer.get_ref().path().to_path_buf()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn stage_row(&mut self, values: &[SqlValue]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(anyhow!(
                "Row for {} has {} values but {} columns were declared",
                self.table,
                values.len(),
                self.columns.len()
            ));
        }
        self.writer
            .write_all(encode_row(values).as_bytes())
            .with_context(|| format!("Failed to write staging row for {}", self.table))?;
        self.rows += 1;
        Ok(())
    }

    /// Load the staged rows and delete the file.
    ///
    /// Returns the number of rows the gateway reports as loaded.
    pub async fn flush(self, db: &dyn DatabaseGateway, mode: LoadMode) -> Result<u64> {
        let Self {
            table,
            columns,
            writer,
            rows,
            ..
        } = self;

        let file = writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush staging file for {}: {}", table, e.error()))?;

        let loaded = db
            .bulk_load(&BulkLoad {
                table: &table,
                columns: &columns,
                file: file.path(),
                mode,
            })
            .await
            .with_context(|| format!("Bulk load of {} staged rows into {} failed", rows, table))?;

        file.close()
            .with_context(|| format!("Failed to remove staging file for {}", table))?;
        Ok(loaded)
    }
}

#[cfg(unix)]
fn make_server_readable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn make_server_readable(_path: &Path) -> Result<()> {
    Ok(())
}
