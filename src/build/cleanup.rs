//! Unconditional end-of-attempt cleanup.

use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::lease::Lease;
use crate::common::sweep_stale;
use crate::config::{Config, PathSet};
use crate::credentials::CredentialSet;
use crate::error::CleanupWarning;
use crate::media::staging_path;

/// What an attempt holds that cleanup has to give back.
#[derive(Debug, Default)]
pub struct AttemptResources {
    pub lease: Option<Lease>,
    pub credentials: Option<CredentialSet>,
}

/// Delete the synthesized image, sweep stale scratch, release the lease
/// and dispose credentials. Never fails; problems come back as warnings.
///
/// The image is only deleted when this attempt holds the lease. Without it
/// the image may belong to a concurrent build of the same version.
pub fn run(config: &Config, paths: &PathSet, resources: AttemptResources) -> Vec<CleanupWarning> {
    let AttemptResources { lease, credentials } = resources;
    let mut warnings = Vec::new();

    if lease.is_some() {
        for path in [paths.image_path.clone(), staging_path(&paths.image_path)] {
            if let Err(e) = delete_file(&path) {
                warnings.push(CleanupWarning::new(format!(
                    "could not delete synthesized image {}: {}",
                    path.display(),
                    e
                )));
            }
        }
    }

    match sweep_stale(&config.scratch_root, config.scratch_grace()) {
        Ok(swept) if !swept.is_empty() => info!(count = swept.len(), "removed stale scratch workspaces"),
        Ok(_) => {}
        Err(e) => warnings.push(CleanupWarning::new(format!(
            "could not sweep scratch root {}: {:#}",
            config.scratch_root.display(),
            e
        ))),
    }

    if let Some(lease) = lease {
        if let Err(e) = lease.release() {
            warnings.push(CleanupWarning::new(format!("could not release lease: {:#}", e)));
        }
    }

    if let Some(mut credentials) = credentials {
        credentials.dispose();
    }

    for warning in &warnings {
        warn!("{}", warning);
    }
    warnings
}

fn delete_file(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "deleted synthesized image");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
