use crate::config::{merge::Merge, types::*};
use crate::db::identifiers::is_valid_identifier;
use anyhow::{Result, anyhow};

/// Layers configuration sources; each `with_*` call overrides the previous ones.
///
/// The usual order is file, then environment, then command line.
pub struct ConfigBuilder {
    config_input: ConfigInput,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config_input: ConfigInput::default(),
        }
    }

    pub fn with_file(mut self, file_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(file_input);
        self
    }

    pub fn with_env(mut self, env_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(env_input);
        self
    }

    pub fn with_cli_args(mut self, cli_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(cli_input);
        self
    }

    pub fn resolve(self) -> Result<Config> {
        let defaults = Config::default();

        Ok(Config {
            database: self.resolve_database(&defaults.database),
            credentials: self.resolve_credentials(),
            patcher: self.resolve_patcher(&defaults.patcher)?,
            bulk: self.resolve_bulk(&defaults.bulk)?,
        })
    }

    fn resolve_database(&self, defaults: &Database) -> Database {
        let db_input = self.config_input.database.as_ref();

        Database {
            url: db_input
                .and_then(|d| d.url.as_ref())
                .cloned()
                .or_else(|| defaults.url.clone()),
            connect_retries: db_input
                .and_then(|d| d.connect_retries)
                .unwrap_or(defaults.connect_retries),
            retry_delay_ms: db_input
                .and_then(|d| d.retry_delay_ms)
                .unwrap_or(defaults.retry_delay_ms),
        }
    }

    fn resolve_credentials(&self) -> Credentials {
        let input = self.config_input.credentials.as_ref();

        Credentials {
            username: input.and_then(|c| c.username.clone()),
            password: input.and_then(|c| c.password.clone()),
        }
    }

    fn resolve_patcher(&self, defaults: &Patcher) -> Result<Patcher> {
        let input = self.config_input.patcher.as_ref();
        let pick = |value: Option<&String>, default: &String| -> String {
            value.cloned().unwrap_or_else(|| default.clone())
        };

        let patcher = Patcher {
            marker_table: pick(input.and_then(|p| p.marker_table.as_ref()), &defaults.marker_table),
            marker_column: pick(
                input.and_then(|p| p.marker_column.as_ref()),
                &defaults.marker_column,
            ),
            history_table: pick(
                input.and_then(|p| p.history_table.as_ref()),
                &defaults.history_table,
            ),
            record_history: input
                .and_then(|p| p.record_history)
                .unwrap_or(defaults.record_history),
            lock_name: pick(input.and_then(|p| p.lock_name.as_ref()), &defaults.lock_name),
            lock_timeout_secs: input
                .and_then(|p| p.lock_timeout_secs)
                .unwrap_or(defaults.lock_timeout_secs),
            transactional_steps: input
                .and_then(|p| p.transactional_steps)
                .unwrap_or(defaults.transactional_steps),
            tenant_query: pick(input.and_then(|p| p.tenant_query.as_ref()), &defaults.tenant_query),
        };

        for (setting, name) in [
            ("patcher.marker_table", &patcher.marker_table),
            ("patcher.marker_column", &patcher.marker_column),
            ("patcher.history_table", &patcher.history_table),
        ] {
            if !is_valid_identifier(name) {
                return Err(anyhow!(
                    "Invalid {} '{}': must contain only letters, numbers, underscores and dollar signs",
                    setting,
                    name
                ));
            }
        }
        if patcher.lock_name.is_empty() || patcher.lock_name.len() > 64 {
            return Err(anyhow!(
                "Invalid patcher.lock_name '{}': must be 1-64 characters",
                patcher.lock_name
            ));
        }

        Ok(patcher)
    }

    fn resolve_bulk(&self, defaults: &Bulk) -> Result<Bulk> {
        let input = self.config_input.bulk.as_ref();

        let bulk = Bulk {
            staging_dir: input
                .and_then(|b| b.staging_dir.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.staging_dir.clone()),
            server_import_dir: input
                .and_then(|b| b.server_import_dir.as_ref())
                .cloned()
                .or_else(|| defaults.server_import_dir.clone()),
            progress_interval: input
                .and_then(|b| b.progress_interval)
                .unwrap_or(defaults.progress_interval),
            insert_batch_size: input
                .and_then(|b| b.insert_batch_size)
                .unwrap_or(defaults.insert_batch_size),
        };

        if bulk.progress_interval == 0 {
            return Err(anyhow!("bulk.progress_interval must be greater than zero"));
        }
        if bulk.insert_batch_size == 0 {
            return Err(anyhow!("bulk.insert_batch_size must be greater than zero"));
        }

        Ok(bulk)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
