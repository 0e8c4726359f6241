use thiserror::Error;

use crate::version::Version;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Unknown target version '{0}': not in the release catalog")]
    UnknownTargetVersion(String),

    #[error(
        "Problem when updating from version {last_applied} to version {failed}: \
         the step stopped after {statements_completed} completed statement(s). \
         The database is recorded at version {last_applied} but version {failed} \
         may be partially applied; inspect it manually before retrying"
    )]
    StepExecution {
        failed: Version,
        last_applied: Version,
        statements_completed: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "Version {applied} was applied but the version marker could not be updated \
         (still recording {last_applied}); fix the marker before retrying"
    )]
    MarkerUpdate {
        applied: Version,
        last_applied: Version,
        #[source]
        source: anyhow::Error,
    },

    #[error("No schema version recorded in table '{table}'")]
    MissingVersionMarker { table: String },

    #[error("Recorded schema version '{value}' is not a valid version")]
    InvalidVersionMarker {
        value: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Another patcher holds the migration lock '{name}'")]
    LockUnavailable { name: String },

    #[error("Migration cancelled before the next step; database is at version {last_applied}")]
    Cancelled { last_applied: Version },

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl MigrationError {
    /// Version the database is known to be at after this error, when known
    pub fn last_applied(&self) -> Option<&Version> {
        match self {
            MigrationError::StepExecution { last_applied, .. }
            | MigrationError::MarkerUpdate { last_applied, .. }
            | MigrationError::Cancelled { last_applied } => Some(last_applied),
            _ => None,
        }
    }
}
