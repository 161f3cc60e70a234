//! Build artifact verification.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{BuildError, BuildResult};

/// Disk files the build engine left in the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub output_dir: PathBuf,
    /// Largest first.
    pub disks: Vec<PathBuf>,
}

impl BuildArtifact {
    /// The disk that gets packaged.
    pub fn primary_disk(&self) -> &Path {
        &self.disks[0]
    }
}

/// Find every `*.<format>` file under `output_dir`.
///
/// Engines nest disks in provider-specific subdirectories, so the whole
/// tree is searched. Zero matches is a validation failure.
pub fn verify(output_dir: &Path, format: &str) -> BuildResult<BuildArtifact> {
    if !output_dir.is_dir() {
        return Err(BuildError::Validation(format!(
            "build output directory missing: {}",
            output_dir.display()
        )));
    }

    let wanted = format.trim_start_matches('.');
    let mut disks: Vec<(u64, PathBuf)> = WalkDir::new(output_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
                .unwrap_or(false)
        })
        .map(|e| {
            let size = e.metadata().map(|m| m.len()).unwrap_or(0);
            (size, e.into_path())
        })
        .collect();

    if disks.is_empty() {
        return Err(BuildError::Validation(format!(
            "no .{} disk file in build output {}",
            wanted,
            output_dir.display()
        )));
    }

    disks.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Ok(BuildArtifact {
        output_dir: output_dir.to_path_buf(),
        disks: disks.into_iter().map(|(_, p)| p).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_verify_finds_nested_disks() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("Virtual Hard Disks");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("small.vhdx"), "a").unwrap();
        fs::write(nested.join("big.VHDX"), "aaaa").unwrap();
        fs::write(tmp.path().join("box.vmcx"), "cfg").unwrap();

        let artifact = verify(tmp.path(), "vhdx").unwrap();
        assert_eq!(artifact.disks.len(), 2);
        assert_eq!(artifact.primary_disk(), nested.join("big.VHDX"));
    }

    #[test]
    fn test_verify_empty_output_fails() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("packer.log"), "log").unwrap();
        let err = verify(tmp.path(), ".vhdx").unwrap_err();
        assert!(err.to_string().contains("no .vhdx disk file"));
    }

    #[test]
    fn test_verify_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(verify(&tmp.path().join("missing"), "vhdx").is_err());
    }
}
