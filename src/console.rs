//! Operator-facing progress output.
//!
//! Every executed statement and every "Updating to X ..." milestone is
//! written to a [`ConsoleSink`]; this is the audit trail of a migration and
//! is kept separate from diagnostic `tracing` output.

use console::style;
use std::sync::Mutex;

pub trait ConsoleSink: Send + Sync {
    fn write(&self, line: &str);

    /// Release-level milestones ("Updating to 17.12 ...")
    fn milestone(&self, line: &str) {
        self.write(line);
    }

    /// Conditions the operator should look at, e.g. a backfill that found no match
    fn warning(&self, line: &str) {
        self.write(line);
    }
}

/// Prints to standard output, highlighting milestones and warnings.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ConsoleSink for StdoutSink {
    fn write(&self, line: &str) {
        println!("{}", line);
    }

    fn milestone(&self, line: &str) {
        println!("{}", style(line).bold().cyan());
    }

    fn warning(&self, line: &str) {
        println!("{} {}", style("⚠").yellow(), style(line).yellow());
    }
}

/// Forwards every line to `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ConsoleSink for TracingSink {
    fn write(&self, line: &str) {
        tracing::info!(target: "dbpatcher::console", "{}", line);
    }

    fn warning(&self, line: &str) {
        tracing::warn!(target: "dbpatcher::console", "{}", line);
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl ConsoleSink for RecordingSink {
    fn write(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
