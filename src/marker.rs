use anyhow::{Context, Result};
use std::time::Duration;

use crate::db::{DatabaseGateway, SqlValue, quote_identifier};
use crate::version::Version;

/// The single-row record holding the schema version of the database.
#[derive(Debug, Clone)]
pub struct VersionMarker {
    table: String,
    column: String,
}

impl VersionMarker {
    pub fn new(table: &str, column: &str) -> Result<Self> {
        Ok(Self {
            table: quote_identifier(table).context("Invalid version marker table")?,
            column: quote_identifier(column).context("Invalid version marker column")?,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn read_statement(&self) -> String {
        format!("SELECT {} FROM {}", self.column, self.table)
    }

    pub fn write_statement(&self) -> String {
        format!("UPDATE {} SET {} = ?", self.table, self.column)
    }

    /// The write as it is shown in the console audit trail
    pub fn audit_line(&self, version: &Version) -> String {
        format!("UPDATE {} SET {} = '{}'", self.table, self.column, version)
    }

    /// Raw marker value; `None` when the table is empty or the value is NULL
    pub async fn read(&self, db: &dyn DatabaseGateway) -> Result<Option<String>> {
        let cursor = db
            .query(&self.read_statement())
            .await
            .with_context(|| format!("Failed to read the version marker from {}", self.table))?;
        Ok(cursor
            .first()
            .and_then(|row| row.at(0).map(|v| v.trim().to_string())))
    }

    pub async fn write(&self, db: &dyn DatabaseGateway, version: &Version) -> Result<()> {
        db.execute_with(&self.write_statement(), &[SqlValue::from(version.as_str())])
            .await
            .with_context(|| format!("Failed to record version {} in {}", version, self.table))?;
        Ok(())
    }
}

/// One applied step as recorded in the history table.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub version: String,
    pub statements: u64,
    pub duration_ms: u64,
    pub applied_at: Option<String>,
}

/// Append-only log of applied steps. Informational only: the marker stays
/// the authority on what has been applied.
#[derive(Debug, Clone)]
pub struct HistoryTable {
    table: String,
}

impl HistoryTable {
    pub fn new(table: &str) -> Result<Self> {
        Ok(Self {
            table: quote_identifier(table).context("Invalid history table")?,
        })
    }

    pub fn create_statement(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             `id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY, \
             `version` VARCHAR(32) NOT NULL, \
             `statements` INT UNSIGNED NOT NULL, \
             `duration_ms` BIGINT UNSIGNED NOT NULL, \
             `applied_at` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8",
            self.table
        )
    }

    pub async fn ensure(&self, db: &dyn DatabaseGateway) -> Result<()> {
        db.execute(&self.create_statement())
            .await
            .with_context(|| format!("Failed to create history table {}", self.table))?;
        Ok(())
    }

    pub async fn record(
        &self,
        db: &dyn DatabaseGateway,
        version: &Version,
        statements: usize,
        duration: Duration,
    ) -> Result<()> {
        db.execute_with(
            &format!(
                "INSERT INTO {} (`version`, `statements`, `duration_ms`) VALUES (?, ?, ?)",
                self.table
            ),
            &[
                SqlValue::from(version.as_str()),
                SqlValue::UInt(statements as u64),
                SqlValue::UInt(duration.as_millis() as u64),
            ],
        )
        .await
        .with_context(|| format!("Failed to record version {} in {}", version, self.table))?;
        Ok(())
    }

    /// Most recent entries first
    pub async fn recent(&self, db: &dyn DatabaseGateway, limit: u64) -> Result<Vec<HistoryEntry>> {
        let cursor = db
            .query_with(
                &format!(
                    "SELECT `version`, `statements`, `duration_ms`, `applied_at` FROM {} ORDER BY `id` DESC LIMIT ?",
                    self.table
                ),
                &[SqlValue::UInt(limit)],
            )
            .await
            .with_context(|| format!("Failed to read {}", self.table))?;

        cursor
            .map(|row| {
                Ok(HistoryEntry {
                    version: row.get("version").unwrap_or_default().to_string(),
                    statements: row.get_i64("statements")?.unwrap_or(0).max(0) as u64,
                    duration_ms: row.get_i64("duration_ms")?.unwrap_or(0).max(0) as u64,
                    applied_at: row.get("applied_at").map(|s| s.to_string()),
                })
            })
            .collect()
    }
}
