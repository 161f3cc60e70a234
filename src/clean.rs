//! Scratch and output cleaning.
//!
//! Nothing here touches credential records. Versions whose lease is held
//! by a running build are skipped entirely.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use crate::common::{remove_tree, sweep_stale};
use crate::config::{Config, PathSet};
use crate::media::staging_path;
use crate::tools::Registry;

/// What a clean removed.
#[derive(Debug, Default)]
pub struct CleanSummary {
    pub removed: Vec<PathBuf>,
    /// Versions left alone because a build holds their lease.
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
}

impl CleanSummary {
    fn remove_file(&mut self, path: PathBuf) {
        if !path.exists() {
            return;
        }
        println!("Removing {}...", path.display());
        match fs::remove_file(&path) {
            Ok(()) => self.removed.push(path),
            Err(e) => self.warnings.push(format!("{}: {}", path.display(), e)),
        }
    }

    fn remove_dir(&mut self, path: PathBuf) {
        if !path.exists() {
            return;
        }
        println!("Removing {}...", path.display());
        match remove_tree(&path) {
            Ok(()) => self.removed.push(path),
            Err(e) => self.warnings.push(format!("{:#}", e)),
        }
    }
}

/// Remove stale scratch workspaces and leftover synthesized images.
pub fn clean_scratch(config: &Config) -> Result<CleanSummary> {
    clean(config, None)
}

/// [`clean_scratch`], plus output directories, engine logs and packaged
/// boxes, which are also unregistered.
pub fn clean_all(config: &Config, registry: &dyn Registry) -> Result<CleanSummary> {
    clean(config, Some(registry))
}

fn clean(config: &Config, registry: Option<&dyn Registry>) -> Result<CleanSummary> {
    let mut summary = CleanSummary::default();

    for path in sweep_stale(&config.scratch_root, config.scratch_grace())? {
        println!("Removed stale workspace {}", path.display());
        summary.removed.push(path);
    }

    for paths in unleased_versions(config, &mut summary) {
        summary.remove_file(staging_path(&paths.image_path));
        summary.remove_file(paths.image_path.clone());

        let Some(registry) = registry else {
            continue;
        };
        summary.remove_dir(paths.output_dir.clone());
        summary.remove_file(paths.engine_log.clone());
        if paths.box_path.exists() {
            if let Err(e) = registry.remove(&paths.artifact_name) {
                summary
                    .warnings
                    .push(format!("unregistering {}: {:#}", paths.artifact_name, e));
            }
            summary.remove_file(paths.box_path);
        }
    }

    Ok(summary)
}

fn unleased_versions(config: &Config, summary: &mut CleanSummary) -> Vec<PathSet> {
    let mut out = Vec::new();
    for tag in config.versions.keys() {
        match config.resolve(tag) {
            Ok(paths) if paths.lease_path.exists() => {
                println!("Skipping {}: lease held ({})", tag, paths.lease_path.display());
                summary.skipped.push(tag.clone());
            }
            Ok(paths) => out.push(paths),
            Err(e) => summary.warnings.push(format!("{}: {}", tag, e)),
        }
    }
    out
}
