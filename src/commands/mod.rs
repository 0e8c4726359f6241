pub mod list;
pub mod migrate;
pub mod status;

pub use list::cmd_list;
pub use migrate::{MigrateOptions, cmd_migrate};
pub use status::cmd_status;

use anyhow::{Result, anyhow};
use std::time::Duration;

use crate::config::Config;
use crate::db::connection::{ConnectionConfig, connect_with_retry};
use crate::db::{LoadStrategy, MySqlGateway};

/// How bulk loads reach the server, from the `bulk` settings
pub fn load_strategy(config: &Config) -> LoadStrategy {
    match &config.bulk.server_import_dir {
        Some(dir) => LoadStrategy::ServerFile {
            import_dir: dir.clone(),
        },
        None => LoadStrategy::BatchedInsert {
            batch_size: config.bulk.insert_batch_size,
        },
    }
}

/// Open the session every command works through
pub async fn connect(config: &Config) -> Result<MySqlGateway> {
    let url = config.database.url.as_deref().ok_or_else(|| {
        anyhow!("No database URL configured. Set database.url, DATABASE_URL or --database-url")
    })?;

    let connection_config = ConnectionConfig {
        max_retries: config.database.connect_retries,
        retry_delay: Duration::from_millis(config.database.retry_delay_ms),
    };
    let conn = connect_with_retry(url, &connection_config).await?;
    Ok(MySqlGateway::new(conn, load_strategy(config)))
}
