use anyhow::Result;
use console::style;

use crate::catalog::VersionCatalog;

/// Print the patcher version and every release it can apply, oldest first
pub fn cmd_list(catalog: &VersionCatalog) -> Result<()> {
    println!("dbpatcher {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Available versions:");
    for step in catalog.steps() {
        println!(
            "  {:<8} {}",
            style(step.version()).bold(),
            style(step.summary()).dim()
        );
    }
    Ok(())
}
