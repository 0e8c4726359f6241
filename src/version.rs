//! Dotted numeric release versions and the comparison rules used to decide
//! whether a release has already been applied to a database.

use anyhow::{Result, anyhow};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A release version such as `17`, `14.8` or `1.10`.
///
/// Segments are compared numerically, never lexicographically, and missing
/// trailing segments count as zero. Equality is textual: `17` and `17.0`
/// are distinct catalog entries even though neither is ahead of the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

/// Position of the recorded database version relative to a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    /// The release has not been applied yet.
    Behind,
    /// The database already contains this release (or a later one).
    EqualOrAhead,
}

impl Version {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Version string is empty"));
        }

        let segments = trimmed
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
                    return Err(anyhow!(
                        "Invalid version '{}': segment '{}' is not a number",
                        trimmed,
                        segment
                    ));
                }
                segment
                    .parse::<u64>()
                    .map_err(|e| anyhow!("Invalid version '{}': {}", trimmed, e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// Numeric comparison with zero padding (`14` < `14.8` < `14.10` < `17`).
    pub fn cmp_numeric(&self, other: &Version) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

/// Release order; `17` and `17.0` tie numerically and fall back to the text.
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_numeric(other).then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Where `current` (the version recorded in the database) stands relative to
/// `candidate` (a catalog release).
///
/// Both sequences are zero padded to the longer length. Every segment but the
/// last short-circuits on a strict difference; the last segment counts as
/// applied when `current >= candidate`.
pub fn standing(current: &Version, candidate: &Version) -> Standing {
    let len = current.segments.len().max(candidate.segments.len());
    let pad = |v: &Version| -> Vec<u64> {
        (0..len)
            .map(|i| v.segments.get(i).copied().unwrap_or(0))
            .collect()
    };
    let cur = pad(current);
    let cand = pad(candidate);

    for i in 0..len {
        if i < len - 1 {
            if cur[i] > cand[i] {
                return Standing::EqualOrAhead;
            }
            if cur[i] < cand[i] {
                return Standing::Behind;
            }
        } else {
            if cur[i] >= cand[i] {
                return Standing::EqualOrAhead;
            }
            return Standing::Behind;
        }
    }

    Standing::Behind
}

/// True when the database at `current` already contains `candidate`.
pub fn is_up_to_date(current: &Version, candidate: &Version) -> bool {
    standing(current, candidate) == Standing::EqualOrAhead
}
