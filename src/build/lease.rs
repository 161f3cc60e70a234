//! Advisory lease on a version's output directory.
//!
//! The lease is a small JSON file next to the output directory, created
//! with create-new semantics. Another invocation finding it present fails
//! with a lease error unless the holder is older than the stale timeout, in
//! which case the lease is broken with a warning and taken over.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BuildError, BuildResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInfo {
    /// Unique per acquisition.
    pub owner: String,
    pub pid: u32,
    pub host: String,
    pub acquired_at: DateTime<Utc>,
}

/// A held lease. Released explicitly or on drop.
#[derive(Debug)]
pub struct Lease {
    path: PathBuf,
    info: LeaseInfo,
    released: bool,
}

impl Lease {
    /// Take the lease at `path`, breaking it if older than `stale_after`.
    pub fn acquire(path: &Path, stale_after: Duration) -> BuildResult<Self> {
        let info = LeaseInfo {
            owner: Uuid::new_v4().to_string(),
            pid: std::process::id(),
            host: hostname(),
            acquired_at: Utc::now(),
        };

        match try_create(path, &info) {
            Ok(()) => {}
            Err(e) if is_already_exists(&e) => {
                let holder = read_info(path);
                if !is_stale(path, holder.as_ref(), stale_after) {
                    return Err(BuildError::Lease(describe_holder(path, holder.as_ref())));
                }
                warn!(
                    "breaking stale lease: {}",
                    describe_holder(path, holder.as_ref())
                );
                fs::remove_file(path)
                    .map_err(|e| BuildError::Lease(format!("cannot break stale lease {}: {}", path.display(), e)))?;
                try_create(path, &info).map_err(|e| {
                    BuildError::Lease(format!("cannot take lease {}: {:#}", path.display(), e))
                })?;
            }
            Err(e) => {
                return Err(BuildError::Lease(format!(
                    "cannot take lease {}: {:#}",
                    path.display(),
                    e
                )))
            }
        }

        info!(lease = %path.display(), "lease acquired");
        Ok(Self {
            path: path.to_path_buf(),
            info,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &LeaseInfo {
        &self.info
    }

    /// Remove the lease file if it is still ours.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.remove()
    }

    fn remove(&self) -> Result<()> {
        match read_info(&self.path) {
            Some(current) if current.owner == self.info.owner => {
                fs::remove_file(&self.path)
                    .with_context(|| format!("Failed to remove lease {}", self.path.display()))?;
                debug!(lease = %self.path.display(), "lease released");
                Ok(())
            }
            Some(_) => {
                warn!(lease = %self.path.display(), "lease was taken over by another invocation, leaving it");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.remove() {
                warn!("{:#}", e);
            }
        }
    }
}

fn try_create(path: &Path, info: &LeaseInfo) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(serde_json::to_string_pretty(info)?.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn is_already_exists(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .map(|e| e.kind() == ErrorKind::AlreadyExists)
        .unwrap_or(false)
}

fn read_info(path: &Path) -> Option<LeaseInfo> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Unreadable lease files age by mtime.
fn is_stale(path: &Path, holder: Option<&LeaseInfo>, stale_after: Duration) -> bool {
    let age = match holder {
        Some(info) => (Utc::now() - info.acquired_at).to_std().unwrap_or(Duration::ZERO),
        None => fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .unwrap_or(Duration::ZERO),
    };
    age >= stale_after
}

fn describe_holder(path: &Path, holder: Option<&LeaseInfo>) -> String {
    match holder {
        Some(info) => format!(
            "{} is held by pid {} on {} since {}",
            path.display(),
            info.pid,
            info.host,
            info.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => format!("{} is held by an unknown owner", path.display()),
    }
}

fn hostname() -> String {
    fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|h| h.trim().to_string())
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_acquire_and_release() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2022.lease");
        let lease = Lease::acquire(&path, HOUR).unwrap();
        assert!(path.exists());
        assert_eq!(lease.info().pid, std::process::id());
        lease.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2022.lease");
        let _held = Lease::acquire(&path, HOUR).unwrap();
        let err = Lease::acquire(&path, HOUR).unwrap_err();
        assert_eq!(err.kind(), "LeaseError");
        assert!(err.to_string().contains("is held by pid"));
    }

    #[test]
    fn test_stale_lease_is_broken() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2022.lease");
        let old = LeaseInfo {
            owner: "someone".into(),
            pid: 1,
            host: "elsewhere".into(),
            acquired_at: Utc::now() - chrono::Duration::hours(48),
        };
        fs::write(&path, serde_json::to_string(&old).unwrap()).unwrap();

        let lease = Lease::acquire(&path, HOUR).unwrap();
        assert_ne!(read_info(&path).unwrap().owner, "someone");
        drop(lease);
        assert!(!path.exists());
    }

    #[test]
    fn test_release_leaves_foreign_lease() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2022.lease");
        let lease = Lease::acquire(&path, HOUR).unwrap();
        let other = LeaseInfo {
            owner: "other".into(),
            pid: 2,
            host: "h".into(),
            acquired_at: Utc::now(),
        };
        fs::write(&path, serde_json::to_string(&other).unwrap()).unwrap();
        lease.release().unwrap();
        assert!(path.exists());
    }
}
