use crate::config::types::*;

/// Trait for merging optional configuration values; `other` wins
pub trait Merge<T> {
    fn merge(self, other: T) -> T;
}

impl<T> Merge<Option<T>> for Option<T> {
    fn merge(self, other: Option<T>) -> Option<T> {
        other.or(self)
    }
}

fn merge_sections<T>(a: Option<T>, b: Option<T>, merge_with: impl FnOnce(T, T) -> T) -> Option<T> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (Some(a), Some(b)) => Some(merge_with(a, b)),
    }
}

impl Merge<ConfigInput> for ConfigInput {
    fn merge(self, other: ConfigInput) -> ConfigInput {
        ConfigInput {
            database: merge_sections(self.database, other.database, DatabaseInput::merge_with),
            credentials: merge_sections(
                self.credentials,
                other.credentials,
                CredentialsInput::merge_with,
            ),
            patcher: merge_sections(self.patcher, other.patcher, PatcherInput::merge_with),
            bulk: merge_sections(self.bulk, other.bulk, BulkInput::merge_with),
        }
    }
}

impl DatabaseInput {
    pub fn merge_with(self, other: DatabaseInput) -> DatabaseInput {
        DatabaseInput {
            url: self.url.merge(other.url),
            connect_retries: self.connect_retries.merge(other.connect_retries),
            retry_delay_ms: self.retry_delay_ms.merge(other.retry_delay_ms),
        }
    }
}

impl CredentialsInput {
    pub fn merge_with(self, other: CredentialsInput) -> CredentialsInput {
        CredentialsInput {
            username: self.username.merge(other.username),
            password: self.password.merge(other.password),
        }
    }
}

impl PatcherInput {
    pub fn merge_with(self, other: PatcherInput) -> PatcherInput {
        PatcherInput {
            marker_table: self.marker_table.merge(other.marker_table),
            marker_column: self.marker_column.merge(other.marker_column),
            history_table: self.history_table.merge(other.history_table),
            record_history: self.record_history.merge(other.record_history),
            lock_name: self.lock_name.merge(other.lock_name),
            lock_timeout_secs: self.lock_timeout_secs.merge(other.lock_timeout_secs),
            transactional_steps: self.transactional_steps.merge(other.transactional_steps),
            tenant_query: self.tenant_query.merge(other.tenant_query),
        }
    }
}

impl BulkInput {
    pub fn merge_with(self, other: BulkInput) -> BulkInput {
        BulkInput {
            staging_dir: self.staging_dir.merge(other.staging_dir),
            server_import_dir: self.server_import_dir.merge(other.server_import_dir),
            progress_interval: self.progress_interval.merge(other.progress_interval),
            insert_batch_size: self.insert_batch_size.merge(other.insert_batch_size),
        }
    }
}
