//! Scratch workspaces.
//!
//! Every stage that stages plaintext credentials on disk does so inside a
//! [`Workspace`]: a freshly randomized directory under the scratch root that
//! is removed when the value is dropped. Workspaces abandoned by a killed
//! process are swept by [`sweep_stale`] once they pass the grace period.

use anyhow::{Context, Result};
use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;

use super::files::create_private_dir;

/// Name prefix shared by every workspace, so sweeps never touch foreign dirs.
pub const WORKSPACE_PREFIX: &str = "goldbox-";

/// A randomized scratch directory, removed on drop.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Create `<scratch_root>/goldbox-<purpose>-<uuid>`.
    pub fn create(scratch_root: &Path, purpose: &str) -> Result<Self> {
        create_private_dir(scratch_root).with_context(|| {
            format!("Failed to create scratch root {}", scratch_root.display())
        })?;
        let name = format!("{}{}-{}", WORKSPACE_PREFIX, purpose, Uuid::new_v4().simple());
        let path = scratch_root.join(name);
        DirBuilder::new()
            .mode(0o700)
            .create(&path)
            .with_context(|| format!("Failed to create workspace {}", path.display()))?;
        debug!(path = %path.display(), "created workspace");
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.path.join(rel)
    }

    /// Remove the workspace now, surfacing any error.
    pub fn remove(mut self) -> Result<()> {
        self.removed = true;
        remove_tree(&self.path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = remove_tree(&self.path) {
            warn!(path = %self.path.display(), "failed to remove workspace: {:#}", e);
        }
    }
}

/// Remove a directory tree, treating "already gone" as success.
///
/// Media copied from read-only images can contain read-only directories,
/// so permissions are relaxed before a second attempt.
pub fn remove_tree(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if fs::remove_dir_all(path).is_ok() {
        return Ok(());
    }
    crate::common::files::make_tree_writable(path)?;
    fs::remove_dir_all(path).with_context(|| format!("Failed to remove {}", path.display()))
}

/// Remove workspaces under `scratch_root` older than `grace`.
///
/// Returns the removed paths. Entries that fail to delete are logged and skipped.
pub fn sweep_stale(scratch_root: &Path, grace: Duration) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !scratch_root.is_dir() {
        return Ok(removed);
    }

    let now = SystemTime::now();
    for entry in fs::read_dir(scratch_root)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(WORKSPACE_PREFIX) {
            continue;
        }
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .unwrap_or_default();
        if age < grace {
            continue;
        }
        match remove_tree(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "swept stale workspace");
                removed.push(path);
            }
            Err(e) => warn!(path = %path.display(), "failed to sweep workspace: {:#}", e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_names_are_unique() {
        let tmp = TempDir::new().unwrap();
        let a = Workspace::create(tmp.path(), "media").unwrap();
        let b = Workspace::create(tmp.path(), "media").unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("goldbox-media-"));
    }

    #[test]
    fn test_workspace_and_new_root_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("scratch");
        let ws = Workspace::create(&root, "media").unwrap();
        for dir in [root.as_path(), ws.path()] {
            let mode = fs::metadata(dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700, "{}", dir.display());
        }
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let tmp = TempDir::new().unwrap();
        let path = {
            let ws = Workspace::create(tmp.path(), "pkg").unwrap();
            fs::write(ws.join("secret.txt"), "plaintext").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_sweep_respects_grace_and_prefix() {
        let tmp = TempDir::new().unwrap();
        let fresh = Workspace::create(tmp.path(), "media").unwrap();
        let foreign = tmp.path().join("not-ours");
        fs::create_dir(&foreign).unwrap();

        let removed = sweep_stale(tmp.path(), Duration::from_secs(3600)).unwrap();
        assert!(removed.is_empty());

        let removed = sweep_stale(tmp.path(), Duration::ZERO).unwrap();
        assert_eq!(removed, vec![fresh.path().to_path_buf()]);
        assert!(foreign.exists());
    }

    #[test]
    fn test_remove_tree_handles_read_only_dirs() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("tree");
        fs::create_dir_all(root.join("sources")).unwrap();
        fs::write(root.join("sources/install.wim"), "wim").unwrap();
        fs::set_permissions(root.join("sources"), fs::Permissions::from_mode(0o555)).unwrap();

        remove_tree(&root).unwrap();
        assert!(!root.exists());
    }
}
