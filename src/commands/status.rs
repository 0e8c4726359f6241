use anyhow::{Result, anyhow};
use std::sync::Arc;
use tracing::debug;

use super::connect;
use crate::catalog::VersionCatalog;
use crate::config::Config;
use crate::console::TracingSink;
use crate::db::DatabaseGateway;
use crate::runner::{MigrationRunner, RunnerSettings};

const HISTORY_LINES: u64 = 10;

/// Show the recorded version, what a full update would apply and the most
/// recent history entries
pub async fn cmd_status(config: &Config, catalog: VersionCatalog) -> Result<()> {
    let latest = catalog
        .latest()
        .map(|step| step.version().to_string())
        .ok_or_else(|| anyhow!("The release catalog is empty"))?;

    let settings = RunnerSettings::from_config(config)?;
    let history = settings.history.clone();
    let db: Arc<dyn DatabaseGateway> = Arc::new(connect(config).await?);

    let mut runner = MigrationRunner::new(catalog, db.clone(), Arc::new(TracingSink), settings);
    let plan = runner.plan(&latest).await?;

    println!("Database version: {}", plan.current);
    if plan.is_up_to_date() {
        println!("Up to date with the latest release ({})", plan.target);
    } else {
        println!("Pending releases up to {}:", plan.target);
        for version in &plan.pending {
            let summary = runner
                .catalog()
                .find(version.as_str())
                .map(|s| s.summary())
                .unwrap_or_default();
            println!("  {:<8} {}", version, summary);
        }
    }

    if let Some(history) = history {
        // the table only exists once a release was applied by this tool
        match history.recent(db.as_ref(), HISTORY_LINES).await {
            Ok(entries) if !entries.is_empty() => {
                println!();
                println!("Recently applied:");
                for entry in entries {
                    println!(
                        "  {:<8} {} statement(s) in {} ms{}",
                        entry.version,
                        entry.statements,
                        entry.duration_ms,
                        entry
                            .applied_at
                            .map(|at| format!(" on {}", at))
                            .unwrap_or_default()
                    );
                }
            }
            Ok(_) => {}
            Err(e) => debug!("No history available: {:#}", e),
        }
    }
    Ok(())
}
