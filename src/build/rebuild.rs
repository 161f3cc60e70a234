//! Rebuild detection.
//!
//! A box is rebuilt when it is missing, older than the rebuild interval, or
//! when the operator forces it. Age is the box file's mtime.

use std::fmt;
use std::path::Path;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildDecision {
    /// No box exists yet.
    Missing,
    /// Box is at least as old as the interval.
    Stale { age: Duration },
    /// Operator asked for a rebuild.
    Forced,
    /// Box is younger than the interval.
    UpToDate { age: Duration },
}

impl RebuildDecision {
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, RebuildDecision::UpToDate { .. })
    }
}

impl fmt::Display for RebuildDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildDecision::Missing => write!(f, "no existing box"),
            RebuildDecision::Stale { age } => write!(f, "box is {} old", format_age(*age)),
            RebuildDecision::Forced => write!(f, "rebuild forced"),
            RebuildDecision::UpToDate { age } => {
                write!(f, "box is up to date ({} old)", format_age(*age))
            }
        }
    }
}

/// Decide whether the box at `box_path` must be rebuilt at time `now`.
///
/// A box whose mtime cannot be read counts as missing; one dated in the
/// future counts as age zero.
pub fn decide(box_path: &Path, interval: Duration, force: bool, now: SystemTime) -> RebuildDecision {
    if force {
        return RebuildDecision::Forced;
    }
    match box_age(box_path, now) {
        None => RebuildDecision::Missing,
        Some(age) if age >= interval => RebuildDecision::Stale { age },
        Some(age) => RebuildDecision::UpToDate { age },
    }
}

/// Age of the file at `path`, if it exists.
pub fn box_age(path: &Path, now: SystemTime) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(now.duration_since(modified).unwrap_or(Duration::ZERO))
}

/// `3d 4h`, `5h`, or `12m`.
pub fn format_age(age: Duration) -> String {
    let mins = age.as_secs() / 60;
    let (days, hours) = (mins / (24 * 60), (mins / 60) % 24);
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h", hours)
    } else {
        format!("{}m", mins)
    }
}
