//! Box packaging and registration.
//!
//! A box is a staging directory holding a copy of the verified disk, the
//! rendered `Vagrantfile` and `metadata.json`, archived into
//! `<storage>/boxes/<artifact>.box` and registered with the artifact
//! registry under the artifact name. The staging directory never outlives
//! the call.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::build::artifact::BuildArtifact;
use crate::common::{sha256_file, write_file_mode, Workspace};
use crate::credentials::Secret;
use crate::error::{BuildError, BuildResult};
use crate::media::staging_path;
use crate::timing::Timer;
use crate::tools::{Archiver, Registry};

pub mod metadata;
pub mod vagrantfile;

pub use metadata::{sanitize_name, BoxMetadata, METADATA_NAME};
pub use vagrantfile::{DescriptorParams, VAGRANTFILE_NAME};

/// A packaged, registered box.
#[derive(Debug, Clone)]
pub struct DistributableBox {
    pub name: String,
    pub path: PathBuf,
    pub metadata: BoxMetadata,
}

/// What to package and under which name.
pub struct BoxRequest<'a> {
    pub artifact: &'a BuildArtifact,
    pub name: &'a str,
    pub os_version: &'a str,
    pub disk_format: &'a str,
    pub provider: &'a str,
    pub box_path: &'a Path,
    pub username: &'a str,
    pub password: &'a Secret,
}

pub struct Packager<'a> {
    archiver: &'a dyn Archiver,
    registry: &'a dyn Registry,
    scratch_root: &'a Path,
}

impl<'a> Packager<'a> {
    pub fn new(archiver: &'a dyn Archiver, registry: &'a dyn Registry, scratch_root: &'a Path) -> Self {
        Self {
            archiver,
            registry,
            scratch_root,
        }
    }

    /// Stage, archive and register one box.
    pub fn package(&self, request: &BoxRequest<'_>) -> BuildResult<DistributableBox> {
        let timer = Timer::start("Packaging");
        let workspace = Workspace::create(self.scratch_root, "box").map_err(BuildError::packaging)?;
        let result = self.package_in(&workspace, request);
        if let Err(e) = workspace.remove() {
            warn!("failed to remove box staging directory: {:#}", e);
        }
        let boxed = result.map_err(BuildError::packaging)?;
        timer.finish();
        Ok(boxed)
    }

    fn package_in(&self, workspace: &Workspace, request: &BoxRequest<'_>) -> Result<DistributableBox> {
        let format = request.disk_format.trim_start_matches('.');
        let disk_name = format!("{}.{}", sanitize_name(request.name), format);
        let disk = workspace.join(&disk_name);
        let source = request.artifact.primary_disk();
        info!(disk = %source.display(), "copying disk into box");
        fs::copy(source, &disk)
            .with_context(|| format!("Failed to copy disk {}", source.display()))?;

        let metadata = BoxMetadata {
            provider: request.provider.to_string(),
            format: format.to_string(),
            artifact: request.name.to_string(),
            os_version: request.os_version.to_string(),
            created: Utc::now(),
            disk: disk_name,
            sha256: sha256_file(&disk)?,
        };

        let descriptor = vagrantfile::render(&DescriptorParams {
            artifact: request.name,
            os_version: request.os_version,
            provider: request.provider,
            username: request.username,
            password: request.password,
        });
        write_file_mode(workspace.join(VAGRANTFILE_NAME), descriptor.as_bytes(), 0o600)?;
        write_file_mode(
            workspace.join(METADATA_NAME),
            serde_json::to_string_pretty(&metadata)?,
            0o644,
        )?;

        let staged = staging_path(request.box_path);
        let published = self.publish(workspace.path(), &staged, request);
        if published.is_err() && staged.exists() {
            let _ = fs::remove_file(&staged);
        }
        published?;
        info!(name = %request.name, path = %request.box_path.display(), "box registered");

        Ok(DistributableBox {
            name: request.name.to_string(),
            path: request.box_path.to_path_buf(),
            metadata,
        })
    }

    /// Archive to `staged`, register it, and only then move it into place,
    /// so `box_path` never holds a box the registry does not know.
    fn publish(&self, dir: &Path, staged: &Path, request: &BoxRequest<'_>) -> Result<()> {
        let box_path = request.box_path;
        if let Some(parent) = box_path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.archiver
            .archive(dir, staged)
            .with_context(|| format!("Archiving box to {}", box_path.display()))?;
        fs::set_permissions(staged, fs::Permissions::from_mode(0o600))?;
        self.registry
            .add(request.name, staged)
            .with_context(|| format!("Registering box '{}'", request.name))?;
        fs::rename(staged, box_path)
            .with_context(|| format!("Moving box into {}", box_path.display()))
    }
}
