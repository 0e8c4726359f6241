use anyhow::Result;
use console::style;
use std::sync::Arc;

use super::connect;
use crate::auth::{Login, require_administrator};
use crate::catalog::VersionCatalog;
use crate::config::Config;
use crate::console::StdoutSink;
use crate::db::DatabaseGateway;
use crate::runner::{CancelFlag, MigrationRunner, RunnerSettings};

#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Catalog version to bring the database to
    pub target: String,
    /// Print the pending releases without applying them
    pub dry_run: bool,
}

pub async fn cmd_migrate(
    config: &Config,
    catalog: VersionCatalog,
    options: &MigrateOptions,
) -> Result<()> {
    // reject an unknown version before asking for anything
    if catalog.find(&options.target).is_none() {
        return Err(crate::runner::MigrationError::UnknownTargetVersion(
            options.target.trim().to_string(),
        )
        .into());
    }

    let login = Login::from_credentials(&config.credentials)?;
    let settings = RunnerSettings::from_config(config)?;
    let db: Arc<dyn DatabaseGateway> = Arc::new(connect(config).await?);
    require_administrator(db.as_ref(), &login).await?;

    let mut runner = MigrationRunner::new(catalog, db, Arc::new(StdoutSink), settings);

    if options.dry_run {
        let plan = runner.plan(&options.target).await?;
        println!("Database version: {}", plan.current);
        if plan.is_up_to_date() {
            println!("Nothing to apply for version {}", plan.target);
        } else {
            println!("Would apply, in order:");
            for version in &plan.pending {
                println!("  {}", style(version).bold());
            }
        }
        return Ok(());
    }

    let cancel = CancelFlag::new();
    cancel.listen_for_signals();
    let mut runner = runner.with_cancel_flag(cancel);

    runner.migrate(&options.target).await?;
    Ok(())
}
