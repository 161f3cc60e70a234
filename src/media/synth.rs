//! Full synthesis and incremental patching of installation images.

use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, warn};

use super::boot::{self, BootArgs, BootFiles};
use super::mount::MountGuard;
use super::{staging_path, MediaStrategy, SynthesizedImage, DESCRIPTOR_NAME, PAYLOAD_FILES, SCRIPTS_DEST};
use crate::common::{copy_tree, create_private_dir, write_file_mode, Workspace};
use crate::error::{BuildError, BuildResult};
use crate::timing::Timer;
use crate::tools::MediaTool;

/// Synthesized images are readable by the owner only.
const IMAGE_MODE: u32 = 0o600;

/// Produces and patches synthesized images inside scratch workspaces.
pub struct MediaSynthesizer<'a> {
    tool: &'a dyn MediaTool,
    scratch_root: &'a Path,
    scripts_dir: Option<&'a Path>,
}

impl<'a> MediaSynthesizer<'a> {
    pub fn new(tool: &'a dyn MediaTool, scratch_root: &'a Path) -> Self {
        Self {
            tool,
            scratch_root,
            scripts_dir: None,
        }
    }

    /// Overlay post-install scripts from `dir` during full synthesis.
    pub fn with_scripts(mut self, dir: Option<&'a Path>) -> Self {
        self.scripts_dir = dir;
        self
    }

    /// Build a new image at `output` from the pristine `source` image.
    ///
    /// Nothing is left at `output` if this fails.
    pub fn full_synthesize(
        &self,
        source: &Path,
        descriptor: &Path,
        output: &Path,
    ) -> BuildResult<SynthesizedImage> {
        if !source.is_file() {
            return Err(BuildError::Validation(format!(
                "source image not found: {}",
                source.display()
            )));
        }
        info!(source = %source.display(), output = %output.display(), "full media synthesis");
        let timer = Timer::start("Full media synthesis");
        let image = self
            .synthesize(source, descriptor, output, MediaStrategy::Full)
            .map_err(BuildError::media)?;
        timer.finish();
        Ok(image)
    }

    /// Replace the descriptor inside the synthesized image at `existing`.
    ///
    /// The image is replaced atomically. On failure the (possibly broken)
    /// image is deleted so the caller can fall back to full synthesis.
    pub fn incremental_patch(
        &self,
        existing: &Path,
        descriptor: &Path,
    ) -> BuildResult<SynthesizedImage> {
        info!(image = %existing.display(), "incremental media patch");
        let timer = Timer::start("Incremental media patch");
        match self.synthesize(existing, descriptor, existing, MediaStrategy::Incremental) {
            Ok(image) => {
                timer.finish();
                Ok(image)
            }
            Err(e) => {
                warn!(image = %existing.display(), "incremental patch failed, discarding image: {:#}", e);
                discard(existing);
                Err(BuildError::media(e))
            }
        }
    }

    fn synthesize(
        &self,
        base_image: &Path,
        descriptor: &Path,
        output: &Path,
        strategy: MediaStrategy,
    ) -> Result<SynthesizedImage> {
        if !descriptor.is_file() {
            bail!("Rendered descriptor not found: {}", descriptor.display());
        }

        let workspace = Workspace::create(self.scratch_root, "media")?;
        let tree = workspace.join("tree");

        let mount = MountGuard::mount(self.tool, base_image, &workspace.join("mnt-base"))?;
        let copied = copy_tree(mount.path(), &tree)
            .with_context(|| format!("Copying content of {}", base_image.display()))?;
        mount.release()?;
        info!(files = copied, "staged media tree");

        fs::copy(descriptor, tree.join(DESCRIPTOR_NAME))
            .with_context(|| format!("Installing {}", DESCRIPTOR_NAME))?;

        if strategy == MediaStrategy::Full {
            boot::swap_no_prompt(&tree)?;
            self.overlay_scripts(&tree)?;
        }

        let boot = BootArgs::detect(&BootFiles::scan(&tree))?;
        info!(mode = %boot.mode(), "boot catalog detected");

        let staged = staging_path(output);
        if let Err(e) = self.compose_verified(&tree, &boot, &staged, &workspace) {
            discard(&staged);
            return Err(e);
        }
        if let Err(e) = fs::rename(&staged, output) {
            discard(&staged);
            return Err(e).with_context(|| format!("Failed to move image into {}", output.display()));
        }

        if let Err(e) = workspace.remove() {
            warn!("failed to remove media workspace: {:#}", e);
        }

        Ok(SynthesizedImage {
            path: output.to_path_buf(),
            boot,
            strategy,
        })
    }

    fn compose_verified(
        &self,
        tree: &Path,
        boot: &BootArgs,
        staged: &Path,
        workspace: &Workspace,
    ) -> Result<()> {
        if let Some(parent) = staged.parent() {
            create_private_dir(parent)?;
        }
        // The image carries plaintext credentials: owner-only from the start.
        write_file_mode(staged, b"", IMAGE_MODE)?;
        self.tool
            .compose(tree, boot, staged)
            .context("Compositor failed")?;
        fs::set_permissions(staged, fs::Permissions::from_mode(IMAGE_MODE))?;
        self.verify(staged, &workspace.join("mnt-verify"))
    }

    /// Mount `image` and check for the descriptor and the install payload.
    pub fn verify(&self, image: &Path, mount_point: &Path) -> Result<()> {
        let mount = MountGuard::mount(self.tool, image, mount_point)?;
        let root = mount.path();
        let has_descriptor = root.join(DESCRIPTOR_NAME).is_file();
        let has_payload = PAYLOAD_FILES.iter().any(|p| root.join(p).is_file());
        mount.release()?;

        if !has_descriptor {
            bail!("{} missing from {}", DESCRIPTOR_NAME, image.display());
        }
        if !has_payload {
            bail!(
                "installation payload ({}) missing from {}",
                PAYLOAD_FILES.join(" or "),
                image.display()
            );
        }
        Ok(())
    }

    fn overlay_scripts(&self, tree: &Path) -> Result<()> {
        let Some(dir) = self.scripts_dir else {
            return Ok(());
        };
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "scripts directory not found, skipping overlay");
            return Ok(());
        }
        let copied = copy_tree(dir, &tree.join(SCRIPTS_DEST))
            .with_context(|| format!("Overlaying scripts from {}", dir.display()))?;
        info!(files = copied, "overlaid post-install scripts");
        Ok(())
    }
}

fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), "failed to delete image: {}", e);
        }
    }
}
