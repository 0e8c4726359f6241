use crate::bulk::DEFAULT_PROGRESS_INTERVAL;
use crate::config::types::*;

impl Default for Database {
    fn default() -> Self {
        Self {
            url: None,
            connect_retries: 5,
            retry_delay_ms: 200,
        }
    }
}

impl Default for Patcher {
    fn default() -> Self {
        Self {
            marker_table: "main".to_string(),
            marker_column: "version".to_string(),
            history_table: "dbpatcher_history".to_string(),
            record_history: true,
            lock_name: "highlander_dbpatcher".to_string(),
            lock_timeout_secs: 10,
            transactional_steps: false,
            tenant_query: "SELECT `analysis` FROM `analyses` ORDER BY `analysis`".to_string(),
        }
    }
}

impl Default for Bulk {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir(),
            server_import_dir: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            insert_batch_size: 500,
        }
    }
}
