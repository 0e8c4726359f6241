use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// A value bound to a statement placeholder or written to a staging file.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Textual form used in staging files and for display; `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::UInt(u) => Some(u.to_string()),
            SqlValue::Float(f) => Some(f.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        SqlValue::UInt(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

/// One result row; every value is carried in its textual form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value at a zero-based position
    pub fn at(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// Value of a named column (case-insensitive, as MySQL reports names)
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|idx| self.at(idx))
    }

    pub fn get_i64(&self, column: &str) -> Result<Option<i64>> {
        self.get(column)
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map_err(|e| anyhow!("Column '{}' value '{}' is not an integer: {}", column, raw, e))
            })
            .transpose()
    }

    pub fn at_i64(&self, index: usize) -> Result<Option<i64>> {
        self.at(index)
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map_err(|e| anyhow!("Column {} value '{}' is not an integer: {}", index, raw, e))
            })
            .transpose()
    }
}

/// Fully fetched result of a query, consumed front to back.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    rows: std::vec::IntoIter<Row>,
    total: usize,
}

impl Cursor {
    pub fn new(rows: Vec<Row>) -> Self {
        let total = rows.len();
        Self {
            rows: rows.into_iter(),
            total,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of rows the query returned, independent of how many were consumed
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn next_row(&mut self) -> Option<Row> {
        self.rows.next()
    }

    /// First row, if any; the rest are discarded
    pub fn first(mut self) -> Option<Row> {
        self.rows.next()
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }
}

/// How a bulk load treats rows colliding with an existing unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Any collision fails the load.
    Strict,
    /// Colliding rows are skipped; the load is allowed to be partial.
    IgnoreDuplicates,
    /// Colliding rows overwrite the existing ones.
    ReplaceDuplicates,
}

impl LoadMode {
    pub fn from_allow_partial(allow_partial: bool) -> Self {
        if allow_partial {
            LoadMode::IgnoreDuplicates
        } else {
            LoadMode::Strict
        }
    }

    /// Keyword placed after the file name in `LOAD DATA` and after `INSERT`
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            LoadMode::Strict => None,
            LoadMode::IgnoreDuplicates => Some("IGNORE"),
            LoadMode::ReplaceDuplicates => Some("REPLACE"),
        }
    }
}

/// A staged file ready to be loaded into `table`.
#[derive(Debug, Clone, Copy)]
pub struct BulkLoad<'a> {
    /// Already quoted table identifier
    pub table: &'a str,
    /// Already quoted column identifiers, in file order
    pub columns: &'a [String],
    pub file: &'a Path,
    pub mode: LoadMode,
}

/// Everything the migration engine needs from the relational store.
///
/// Each statement commits on its own unless the caller opened a transaction.
#[async_trait]
pub trait DatabaseGateway: Send + Sync {
    /// Execute a statement with positional `?` parameters; returns affected rows
    async fn execute_with(&self, statement: &str, params: &[SqlValue]) -> Result<u64>;

    async fn query_with(&self, statement: &str, params: &[SqlValue]) -> Result<Cursor>;

    /// Load a staging file into a table; returns the rows the server reports
    async fn bulk_load(&self, load: &BulkLoad<'_>) -> Result<u64>;

    /// Try to take a named advisory lock, waiting at most `timeout`
    async fn try_lock(&self, name: &str, timeout: Duration) -> Result<bool>;

    async fn unlock(&self, name: &str) -> Result<()>;

    async fn execute(&self, statement: &str) -> Result<u64> {
        self.execute_with(statement, &[]).await
    }

    async fn query(&self, statement: &str) -> Result<Cursor> {
        self.query_with(statement, &[]).await
    }

    async fn begin(&self) -> Result<()> {
        self.execute("START TRANSACTION").await.map(|_| ())
    }

    async fn commit(&self) -> Result<()> {
        self.execute("COMMIT").await.map(|_| ())
    }

    async fn rollback(&self) -> Result<()> {
        self.execute("ROLLBACK").await.map(|_| ())
    }
}
