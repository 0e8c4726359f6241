use chrono::Local;
use std::time::{Duration, Instant};

pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H_%M_%S";

/// Periodic progress for long row-by-row transfers.
///
/// Every `interval` recorded rows a line is produced with the wall clock,
/// the count, the share of the up-front estimate, the elapsed time and
/// the resident memory of the process.
#[derive(Debug)]
pub struct TransferProgress {
    label: String,
    estimated_total: u64,
    interval: u64,
    processed: u64,
    started: Instant,
}

impl TransferProgress {
    pub fn new(label: impl Into<String>, estimated_total: u64, interval: u64) -> Self {
        Self {
            label: label.into(),
            estimated_total,
            interval: interval.max(1),
            processed: 0,
            started: Instant::now(),
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Count one row; returns a report line at each interval boundary
    pub fn record(&mut self) -> Option<String> {
        self.processed += 1;
        if self.processed % self.interval == 0 {
            Some(self.report())
        } else {
            None
        }
    }

    /// Report line for the current count
    pub fn report(&self) -> String {
        format!(
            "{} - {} {} processed ({}) - elapsed {} - {}",
            Local::now().format(TIMESTAMP_FORMAT),
            self.processed,
            self.label,
            format_percent(self.processed, self.estimated_total),
            format_duration(self.started.elapsed()),
            format_memory(resident_memory_mb()),
        )
    }

    /// Milestone line, e.g. before each bulk load
    pub fn milestone(&self, what: &str) -> String {
        format!(
            "{} - {} - {}",
            Local::now().format(TIMESTAMP_FORMAT),
            what,
            format_memory(resident_memory_mb()),
        )
    }
}

fn format_percent(done: u64, total: u64) -> String {
    if total == 0 {
        return "n/a".to_string();
    }
    format!("{:.2}%", done as f64 * 100.0 / total as f64)
}

fn format_memory(mb: Option<u64>) -> String {
    match mb {
        Some(mb) => format!("{} Mb of RAM used", mb),
        None => "RAM usage unavailable".to_string(),
    }
}

/// Resident set size of this process in megabytes
#[cfg(target_os = "linux")]
pub fn resident_memory_mb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line
        .trim_start_matches("VmRSS:")
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kb / 1024)
}

#[cfg(not(target_os = "linux"))]
pub fn resident_memory_mb() -> Option<u64> {
    None
}

pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let millis = d.subsec_millis();

    match total_secs {
        0 => format!("{}ms", millis),
        1..=59 if millis >= 100 => format!("{}.{}s", total_secs, millis / 100),
        1..=59 => format!("{}s", total_secs),
        60..=3599 => match total_secs % 60 {
            0 => format!("{}m", total_secs / 60),
            secs => format!("{}m{}s", total_secs / 60, secs),
        },
        _ => match (total_secs % 3600) / 60 {
            0 => format!("{}h", total_secs / 3600),
            mins => format!("{}h{}m", total_secs / 3600, mins),
        },
    }
}
