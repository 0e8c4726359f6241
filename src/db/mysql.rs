use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use itertools::Itertools;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row as _};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

use super::error_context::SqlErrorContext;
use super::gateway::{BulkLoad, Cursor, DatabaseGateway, LoadMode, Row, SqlValue};
use crate::bulk::format::decode_line;

/// How staged files reach the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStrategy {
    /// `LOAD DATA INFILE`; staged files are looked up by name in
    /// `import_dir`, the staging directory as the server sees it.
    ServerFile { import_dir: PathBuf },
    /// Read the file client side and send batched multi-row inserts.
    BatchedInsert { batch_size: usize },
}

/// [`DatabaseGateway`] over one dedicated MySQL session.
pub struct MySqlGateway {
    conn: Mutex<MySqlConnection>,
    strategy: LoadStrategy,
}

impl MySqlGateway {
    pub fn new(conn: MySqlConnection, strategy: LoadStrategy) -> Self {
        Self {
            conn: Mutex::new(conn),
            strategy,
        }
    }

    fn sql_error(error: sqlx::Error, statement: &str) -> anyhow::Error {
        anyhow!(SqlErrorContext::from_sqlx_error(&error).format(statement))
    }

    async fn insert_batch(
        &self,
        conn: &mut MySqlConnection,
        head: &str,
        rows: &[Vec<Option<String>>],
        width: usize,
    ) -> Result<u64> {
        let tuple = format!("({})", vec!["?"; width].join(", "));
        let statement = format!("{} VALUES {}", head, vec![tuple; rows.len()].join(", "));

        let mut query = sqlx::query(&statement);
        for value in rows.iter().flatten() {
            query = query.bind(value.clone());
        }

        query
            .execute(&mut *conn)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| Self::sql_error(e, &statement))
    }

    async fn load_with_inserts(&self, load: &BulkLoad<'_>, batch_size: usize) -> Result<u64> {
        let head = insert_head(load);
        let width = load.columns.len();

        let file = tokio::fs::File::open(load.file)
            .await
            .with_context(|| format!("Failed to open staging file {}", load.file.display()))?;
        let mut lines = BufReader::new(file).lines();

        let mut conn = self.conn.lock().await;
        let mut batch: Vec<Vec<Option<String>>> = Vec::with_capacity(batch_size);
        let mut affected = 0u64;
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let fields = decode_line(&line);
            if fields.len() != width {
                return Err(anyhow!(
                    "Staging file {} line {}: expected {} fields, found {}",
                    load.file.display(),
                    line_no,
                    width,
                    fields.len()
                ));
            }
            batch.push(fields);
            if batch.len() >= batch_size {
                affected += self.insert_batch(&mut conn, &head, &batch, width).await?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            affected += self.insert_batch(&mut conn, &head, &batch, width).await?;
        }

        Ok(affected)
    }
}

#[async_trait]
impl DatabaseGateway for MySqlGateway {
    async fn execute_with(&self, statement: &str, params: &[SqlValue]) -> Result<u64> {
        let mut conn = self.conn.lock().await;
        let result = if params.is_empty() {
            // text protocol; DDL, LOAD DATA and stored routines cannot be prepared
            sqlx::Executor::execute(&mut *conn, statement).await
        } else {
            bind_all(sqlx::query(statement), params)
                .execute(&mut *conn)
                .await
        };
        result
            .map(|r| r.rows_affected())
            .map_err(|e| Self::sql_error(e, statement))
    }

    async fn query_with(&self, statement: &str, params: &[SqlValue]) -> Result<Cursor> {
        let mut conn = self.conn.lock().await;
        let rows = if params.is_empty() {
            sqlx::Executor::fetch_all(&mut *conn, statement).await
        } else {
            bind_all(sqlx::query(statement), params)
                .fetch_all(&mut *conn)
                .await
        }
        .map_err(|e| Self::sql_error(e, statement))?;

        let rows = rows.iter().map(to_row).collect::<Result<Vec<_>>>()?;
        Ok(Cursor::new(rows))
    }

    async fn bulk_load(&self, load: &BulkLoad<'_>) -> Result<u64> {
        match &self.strategy {
            LoadStrategy::ServerFile { import_dir } => {
                let statement = load_data_statement(import_dir, load)?;
                debug!("{}", statement);
                self.execute(&statement).await
            }
            LoadStrategy::BatchedInsert { batch_size } => {
                self.load_with_inserts(load, (*batch_size).max(1)).await
            }
        }
    }

    async fn try_lock(&self, name: &str, timeout: Duration) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let acquired: Option<i64> = sqlx::query_scalar("SELECT GET_LOCK(?, ?)")
            .bind(name)
            .bind(timeout.as_secs() as i64)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| Self::sql_error(e, "SELECT GET_LOCK(?, ?)"))?;
        Ok(acquired == Some(1))
    }

    async fn unlock(&self, name: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        sqlx::query("SELECT RELEASE_LOCK(?)")
            .bind(name)
            .execute(&mut *conn)
            .await
            .map_err(|e| Self::sql_error(e, "SELECT RELEASE_LOCK(?)"))?;
        Ok(())
    }
}

/// `INSERT` prefix for client-side batches; duplicates follow `load.mode`
fn insert_head(load: &BulkLoad<'_>) -> String {
    let verb = match load.mode {
        LoadMode::Strict => "INSERT INTO",
        LoadMode::IgnoreDuplicates => "INSERT IGNORE INTO",
        LoadMode::ReplaceDuplicates => "REPLACE INTO",
    };
    format!("{} {} ({})", verb, load.table, load.columns.iter().join(", "))
}

/// `LOAD DATA INFILE` for a staged file, addressed by its name in `import_dir`
fn load_data_statement(import_dir: &Path, load: &BulkLoad<'_>) -> Result<String> {
    let file_name = load
        .file
        .file_name()
        .ok_or_else(|| anyhow!("Staging path {} has no file name", load.file.display()))?;
    let server_path = import_dir.join(file_name);
    let path = server_path
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'");
    Ok(format!(
        "LOAD DATA INFILE '{}' {}INTO TABLE {} ({})",
        path,
        load.mode.keyword().map(|k| format!("{} ", k)).unwrap_or_default(),
        load.table,
        load.columns.iter().join(", ")
    ))
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::UInt(u) => query.bind(*u),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

fn to_row(row: &MySqlRow) -> Result<Row> {
    let columns = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>();
    let values = (0..columns.len())
        .map(|idx| column_text(row, idx))
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(columns, values))
}

/// Render one column as text regardless of its MySQL type
fn column_text(row: &MySqlRow, idx: usize) -> Result<Option<String>> {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return Ok(v);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return Ok(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return Ok(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return Ok(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return Ok(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return Ok(v.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()));
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return Ok(v.map(|d| d.format("%Y-%m-%d").to_string()));
    }
    // DECIMAL and friends travel as text on the wire
    if let Ok(v) = row.try_get_unchecked::<Option<String>, _>(idx) {
        return Ok(v);
    }
    row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)
        .map(|v| v.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
        .with_context(|| format!("Cannot decode column {} as text", idx))
}
