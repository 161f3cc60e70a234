//! Scoped image mounts.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::tools::MediaTool;

/// A mounted image. Unmounted on [`release`](Self::release) or drop.
pub struct MountGuard<'a> {
    tool: &'a dyn MediaTool,
    mount_point: PathBuf,
    mounted: bool,
}

impl<'a> MountGuard<'a> {
    /// Mount `image` read-only at `mount_point`, creating the directory.
    pub fn mount(tool: &'a dyn MediaTool, image: &Path, mount_point: &Path) -> Result<Self> {
        if !image.is_file() {
            anyhow::bail!("Image not found: {}", image.display());
        }
        fs::create_dir_all(mount_point)
            .with_context(|| format!("Failed to create mount point {}", mount_point.display()))?;
        tool.mount(image, mount_point)?;
        debug!(image = %image.display(), at = %mount_point.display(), "mounted");
        Ok(Self {
            tool,
            mount_point: mount_point.to_path_buf(),
            mounted: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.mount_point
    }

    /// Unmount now and report failure to the caller.
    pub fn release(mut self) -> Result<()> {
        self.mounted = false;
        self.tool.unmount(&self.mount_point)?;
        let _ = fs::remove_dir(&self.mount_point);
        debug!(at = %self.mount_point.display(), "unmounted");
        Ok(())
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if !self.mounted {
            return;
        }
        match self.tool.unmount(&self.mount_point) {
            Ok(()) => {
                let _ = fs::remove_dir(&self.mount_point);
            }
            Err(e) => warn!(
                at = %self.mount_point.display(),
                "failed to unmount, volume may still be attached: {:#}", e
            ),
        }
    }
}
