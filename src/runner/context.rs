use anyhow::{Context, Result};
use itertools::Itertools;

use super::RunnerSettings;
use crate::bulk::{BulkTransfer, TransferProgress};
use crate::console::ConsoleSink;
use crate::db::{Cursor, DatabaseGateway, LoadMode, SqlValue};
use crate::tenants::TenantSet;
use crate::version::Version;

/// What a step sees while it runs.
///
/// Every statement goes through here so it is echoed to the console and
/// counted; the count is reported if the step fails partway through.
pub struct StepContext<'a> {
    db: &'a dyn DatabaseGateway,
    console: &'a dyn ConsoleSink,
    settings: &'a RunnerSettings,
    version: &'a Version,
    tenants: Option<TenantSet>,
    statements: usize,
}

impl<'a> StepContext<'a> {
    pub fn new(
        db: &'a dyn DatabaseGateway,
        console: &'a dyn ConsoleSink,
        settings: &'a RunnerSettings,
        version: &'a Version,
    ) -> Self {
        Self {
            db,
            console,
            settings,
            version,
            tenants: None,
            statements: 0,
        }
    }

    pub fn version(&self) -> &Version {
        self.version
    }

    pub fn db(&self) -> &dyn DatabaseGateway {
        self.db
    }

    /// Statements (and bulk loads) that completed so far in this step
    pub fn statements_completed(&self) -> usize {
        self.statements
    }

    pub fn say(&self, line: &str) {
        self.console.write(line);
    }

    pub fn warn(&self, line: &str) {
        self.console.warning(line);
    }

    pub fn banner(&self, title: &str) {
        self.console.write(&format!("---[ {} ]---", title));
    }

    pub async fn execute(&mut self, statement: &str) -> Result<u64> {
        self.console.write(statement);
        let affected = self.db.execute(statement).await?;
        self.statements += 1;
        Ok(affected)
    }

    pub async fn execute_with(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64> {
        self.console.write(&audit_line(statement, params));
        let affected = self.db.execute_with(statement, params).await?;
        self.statements += 1;
        Ok(affected)
    }

    pub async fn query(&self, statement: &str) -> Result<Cursor> {
        self.db.query(statement).await
    }

    pub async fn query_with(&self, statement: &str, params: &[SqlValue]) -> Result<Cursor> {
        self.db.query_with(statement, params).await
    }

    /// Analyses of this database, discovered on first use
    pub async fn tenants(&mut self) -> Result<&TenantSet> {
        if self.tenants.is_none() {
            let tenants = TenantSet::discover(self.db, &self.settings.tenant_query).await?;
            tracing::debug!("Discovered {} analyses", tenants.len());
            self.tenants = Some(tenants);
        }
        Ok(self.tenants.get_or_insert_with(TenantSet::default))
    }

    /// Run a statement template once per analysis, in discovery order
    pub async fn for_each_tenant(&mut self, template: &str) -> Result<()> {
        let statements = self.tenants().await?.render_all(template)?;
        for statement in statements {
            self.execute(&statement).await?;
        }
        Ok(())
    }

    /// A fresh transfer staging into the configured directory
    pub fn bulk_transfer(&self) -> BulkTransfer {
        BulkTransfer::new(self.settings.staging_dir.clone())
    }

    pub fn progress(&self, label: &str, estimated_total: u64) -> TransferProgress {
        TransferProgress::new(label, estimated_total, self.settings.progress_interval)
    }

    /// Load what `transfer` staged for `table`; counts as one statement
    pub async fn flush(
        &mut self,
        transfer: &mut BulkTransfer,
        table: &str,
        mode: LoadMode,
    ) -> Result<u64> {
        let staged = transfer.staged_rows(table);
        self.console.write(&format!(
            "Importing {} staged rows into `{}` ({:?})",
            staged, table, mode
        ));
        let loaded = transfer
            .flush(self.db, table, mode)
            .await
            .with_context(|| format!("Version {}: importing into {}", self.version, table))?;
        self.statements += 1;
        Ok(loaded)
    }
}

/// Statement with its bound values appended, for the audit trail
fn audit_line(statement: &str, params: &[SqlValue]) -> String {
    if params.is_empty() {
        return statement.to_string();
    }
    format!(
        "{} -- ({})",
        statement,
        params
            .iter()
            .map(|p| match p {
                SqlValue::Text(s) => format!("'{}'", s),
                other => other.to_string(),
            })
            .join(", ")
    )
}
