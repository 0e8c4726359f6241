//! Applies catalog steps to a database, in order, exactly once each.

pub mod cancel;
pub mod context;
pub mod error;

pub use cancel::CancelFlag;
pub use context::StepContext;
pub use error::MigrationError;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::bulk::progress::format_duration;
use crate::catalog::{VersionCatalog, VersionStep};
use crate::config::Config;
use crate::console::ConsoleSink;
use crate::db::DatabaseGateway;
use crate::marker::{HistoryTable, VersionMarker};
use crate::version::{Version, is_up_to_date};

/// Runner settings derived from the resolved configuration.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub marker: VersionMarker,
    pub history: Option<HistoryTable>,
    pub lock_name: String,
    pub lock_timeout: Duration,
    pub transactional: bool,
    pub tenant_query: String,
    pub staging_dir: PathBuf,
    pub progress_interval: u64,
}

impl RunnerSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let patcher = &config.patcher;
        Ok(Self {
            marker: VersionMarker::new(&patcher.marker_table, &patcher.marker_column)?,
            history: if patcher.record_history {
                Some(HistoryTable::new(&patcher.history_table)?)
            } else {
                None
            },
            lock_name: patcher.lock_name.clone(),
            lock_timeout: Duration::from_secs(patcher.lock_timeout_secs),
            transactional: patcher.transactional_steps,
            tenant_query: patcher.tenant_query.clone(),
            staging_dir: config.bulk.staging_dir.clone(),
            progress_interval: config.bulk.progress_interval,
        })
    }
}

/// The steps a migration to `target` would apply, without applying them.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    pub current: Version,
    pub target: Version,
    pub pending: Vec<Version>,
}

impl MigrationPlan {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Steps of `steps` still to apply from `current`.
///
/// Mirrors the runner loop: after each pending step the database is taken
/// to be at that step's version for the remaining comparisons.
pub fn pending_steps<'c>(steps: &'c [VersionStep], current: &Version) -> Vec<&'c VersionStep> {
    let mut at = current;
    let mut pending = Vec::new();
    for step in steps {
        if !is_up_to_date(at, step.version()) {
            pending.push(step);
            at = step.version();
        }
    }
    pending
}

pub struct MigrationRunner {
    catalog: VersionCatalog,
    db: Arc<dyn DatabaseGateway>,
    console: Arc<dyn ConsoleSink>,
    settings: RunnerSettings,
    current: Option<Version>,
    cancel: CancelFlag,
}

impl MigrationRunner {
    pub fn new(
        catalog: VersionCatalog,
        db: Arc<dyn DatabaseGateway>,
        console: Arc<dyn ConsoleSink>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            catalog,
            db,
            console,
            settings,
            current: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    /// Version last read from or written to the marker by this runner
    pub fn current_version(&self) -> Option<&Version> {
        self.current.as_ref()
    }

    /// Re-read the marker from the database
    pub async fn refresh(&mut self) -> Result<&Version, MigrationError> {
        let version = self.read_marker().await?;
        Ok(self.current.insert(version))
    }

    /// Pending steps up to `target` given the version recorded right now
    pub async fn plan(&mut self, target: &str) -> Result<MigrationPlan, MigrationError> {
        let target_idx = self.target_index(target)?;
        let current = self.refresh().await?.clone();

        let pending = pending_steps(&self.catalog.steps()[..=target_idx], &current)
            .into_iter()
            .map(|s| s.version().clone())
            .collect();

        Ok(MigrationPlan {
            current,
            target: self.catalog.steps()[target_idx].version().clone(),
            pending,
        })
    }

    /// Bring the database up to `target`, applying every pending step before
    /// it in release order. Returns the versions applied, in order.
    pub async fn migrate(&mut self, target: &str) -> Result<Vec<Version>, MigrationError> {
        let target_idx = self.target_index(target)?;

        let lock_name = self.settings.lock_name.clone();
        if !self.db.try_lock(&lock_name, self.settings.lock_timeout).await? {
            return Err(MigrationError::LockUnavailable { name: lock_name });
        }
        debug!("Acquired migration lock '{}'", lock_name);

        let result = self.migrate_locked(target_idx).await;

        if let Err(e) = self.db.unlock(&lock_name).await {
            warn!("Failed to release migration lock '{}': {:#}", lock_name, e);
        }
        result
    }

    fn target_index(&self, target: &str) -> Result<usize, MigrationError> {
        self.catalog
            .position(target)
            .ok_or_else(|| MigrationError::UnknownTargetVersion(target.trim().to_string()))
    }

    async fn read_marker(&self) -> Result<Version, MigrationError> {
        let raw = self.settings.marker.read(self.db.as_ref()).await?;
        let raw = raw.ok_or_else(|| MigrationError::MissingVersionMarker {
            table: self.settings.marker.table().to_string(),
        })?;
        Version::parse(&raw).map_err(|source| MigrationError::InvalidVersionMarker { value: raw, source })
    }

    async fn migrate_locked(&mut self, target_idx: usize) -> Result<Vec<Version>, MigrationError> {
        let mut current = self.read_marker().await?;
        self.current = Some(current.clone());
        info!("Database is at version {}", current);

        let started = Instant::now();
        let mut applied: Vec<Version> = Vec::new();
        let mut history = self.settings.history.as_ref();
        let mut history_ready = false;

        for step in &self.catalog.steps()[..=target_idx] {
            if is_up_to_date(&current, step.version()) {
                debug!("Version {} already applied (database at {})", step.version(), current);
                continue;
            }

            if self.cancel.is_cancelled() {
                return Err(MigrationError::Cancelled {
                    last_applied: current,
                });
            }

            if applied.is_empty() {
                self.console.milestone("Updating database - DO NOT INTERRUPT !");
            }

            if let Some(table) = history
                && !history_ready
            {
                if let Err(e) = table.ensure(self.db.as_ref()).await {
                    warn!("History will not be recorded for this run: {:#}", e);
                    history = None;
                }
                history_ready = true;
            }

            let (statements, duration) = self.apply_step(step, &current).await?;

            current = step.version().clone();
            self.current = Some(current.clone());
            applied.push(current.clone());
            if let Some(table) = history {
                record_history(self.db.as_ref(), table, step, statements, duration).await;
            }
        }

        if applied.is_empty() {
            self.console
                .write(&format!("Database is up to date (version {})", current));
        } else {
            self.console.milestone(&format!(
                "Database updated to version {} ({} step(s) in {})",
                current,
                applied.len(),
                format_duration(started.elapsed())
            ));
        }

        Ok(applied)
    }

    /// Run one step and advance the marker; returns (statements, duration)
    async fn apply_step(
        &self,
        step: &VersionStep,
        previous: &Version,
    ) -> Result<(usize, Duration), MigrationError> {
        let db = self.db.as_ref();
        let version = step.version();
        let started = Instant::now();

        self.console.milestone(&format!("Updating to {} ...", version));
        info!("Applying version {}: {}", version, step.summary());

        if self.settings.transactional {
            db.begin().await?;
        }

        let mut ctx = StepContext::new(db, self.console.as_ref(), &self.settings, version);
        if let Err(source) = step.apply(&mut ctx).await {
            let statements_completed = ctx.statements_completed();
            self.rollback_if_transactional().await;
            return Err(MigrationError::StepExecution {
                failed: version.clone(),
                last_applied: previous.clone(),
                statements_completed,
                source,
            });
        }
        let statements = ctx.statements_completed();

        self.console.write(&self.settings.marker.audit_line(version));
        let marker_written = async {
            self.settings.marker.write(db, version).await?;
            if self.settings.transactional {
                db.commit().await.context("Failed to commit the step")?;
            }
            Ok::<_, anyhow::Error>(())
        }
        .await;

        if let Err(source) = marker_written {
            self.rollback_if_transactional().await;
            return Err(MigrationError::MarkerUpdate {
                applied: version.clone(),
                last_applied: previous.clone(),
                source,
            });
        }

        Ok((statements, started.elapsed()))
    }

    async fn rollback_if_transactional(&self) {
        if self.settings.transactional
            && let Err(e) = self.db.rollback().await
        {
            warn!("Rollback failed: {:#}", e);
        }
    }
}

async fn record_history(
    db: &dyn DatabaseGateway,
    history: &HistoryTable,
    step: &VersionStep,
    statements: usize,
    duration: Duration,
) {
    if let Err(e) = history.record(db, step.version(), statements, duration).await {
        warn!("Version {} applied but not recorded in history: {:#}", step.version(), e);
    }
}
