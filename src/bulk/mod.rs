//! Staged bulk transfers for steps that reshape large tables.

pub mod format;
pub mod progress;
pub mod staging;
pub mod transfer;

pub use progress::{DEFAULT_PROGRESS_INTERVAL, TransferProgress};
pub use staging::StagingFile;
pub use transfer::BulkTransfer;
