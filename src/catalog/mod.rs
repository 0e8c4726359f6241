//! Release catalog: every schema version the patcher knows, in release order.
//!
//! A step is data, not a subclass: an ordered list of operations run one
//! after the other against the database. Statements inside a step are never
//! reordered or batched, since later ones usually depend on earlier ones.

pub mod annotation_split;
pub mod backfills;
pub mod releases;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use crate::runner::StepContext;
use crate::version::Version;

/// Work that cannot be written as a fixed statement: backfills computed in
/// application code, guarded creates, bulk reshaping of tables.
#[async_trait]
pub trait CustomOperation: Send + Sync {
    /// One-line description shown in plans and listings
    fn describe(&self) -> &str;

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<()>;
}

pub enum Operation {
    /// Section heading written to the console; touches nothing
    Banner(Cow<'static, str>),
    /// A single statement run as-is
    Statement(Cow<'static, str>),
    /// A statement template run once per analysis, `{tenant}` substituted
    PerTenant(Cow<'static, str>),
    Custom(Box<dyn CustomOperation>),
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Banner(title) => f.debug_tuple("Banner").field(title).finish(),
            Operation::Statement(sql) => f.debug_tuple("Statement").field(sql).finish(),
            Operation::PerTenant(sql) => f.debug_tuple("PerTenant").field(sql).finish(),
            Operation::Custom(op) => f.debug_tuple("Custom").field(&op.describe()).finish(),
        }
    }
}

/// One release: a version and the operations that bring a database to it.
#[derive(Debug)]
pub struct VersionStep {
    version: Version,
    summary: Cow<'static, str>,
    operations: Vec<Operation>,
}

impl VersionStep {
    pub fn new(version: Version, summary: impl Into<Cow<'static, str>>) -> Self {
        Self {
            version,
            summary: summary.into(),
            operations: Vec::new(),
        }
    }

    pub fn banner(mut self, title: impl Into<Cow<'static, str>>) -> Self {
        self.operations.push(Operation::Banner(title.into()));
        self
    }

    pub fn sql(mut self, statement: impl Into<Cow<'static, str>>) -> Self {
        self.operations.push(Operation::Statement(statement.into()));
        self
    }

    pub fn per_tenant(mut self, template: impl Into<Cow<'static, str>>) -> Self {
        self.operations.push(Operation::PerTenant(template.into()));
        self
    }

    pub fn custom(mut self, operation: impl CustomOperation + 'static) -> Self {
        self.operations.push(Operation::Custom(Box::new(operation)));
        self
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Run every operation in order; the first error stops the step
    pub async fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        for operation in &self.operations {
            match operation {
                Operation::Banner(title) => ctx.banner(title),
                Operation::Statement(sql) => {
                    ctx.execute(sql).await?;
                }
                Operation::PerTenant(template) => ctx.for_each_tenant(template).await?,
                Operation::Custom(op) => {
                    tracing::debug!("Running custom operation: {}", op.describe());
                    op.run(ctx).await?;
                }
            }
        }
        Ok(())
    }
}

/// Append-only, release-ordered registry of steps.
#[derive(Debug)]
pub struct VersionCatalog {
    steps: Vec<VersionStep>,
}

impl VersionCatalog {
    /// Build a catalog, checking that versions are unique and that insertion
    /// order is ascending version order.
    pub fn new(steps: Vec<VersionStep>) -> Result<Self> {
        for pair in steps.windows(2) {
            let (prev, next) = (pair[0].version(), pair[1].version());
            if prev == next {
                return Err(anyhow!("Version {} appears twice in the catalog", next));
            }
            if prev.cmp_numeric(next) != Ordering::Less {
                return Err(anyhow!(
                    "Catalog is out of order: {} is listed after {}",
                    next,
                    prev
                ));
            }
        }
        Ok(Self { steps })
    }

    /// The Highlander release history
    pub fn highlander() -> Result<Self> {
        Self::new(releases::all()?)
    }

    /// Every step in release order
    pub fn steps(&self) -> &[VersionStep] {
        &self.steps
    }

    pub fn find(&self, version: &str) -> Option<&VersionStep> {
        self.position(version).map(|idx| &self.steps[idx])
    }

    pub fn position(&self, version: &str) -> Option<usize> {
        let version = version.trim();
        self.steps.iter().position(|s| s.version().as_str() == version)
    }

    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.steps.iter().map(|s| s.version())
    }

    pub fn latest(&self) -> Option<&VersionStep> {
        self.steps.last()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
