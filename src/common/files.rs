//! File helpers: owner-only writes and media tree copies.

use anyhow::{bail, Context, Result};
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;
use walkdir::WalkDir;

/// Write a file, creating parent directories as needed.
pub fn write_file_with_dirs<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, content: C) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write a file with specific Unix permissions, creating parent directories as needed.
///
/// The mode is applied before any content is written, so the file is never
/// readable more widely than `mode` allows.
pub fn write_file_mode<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
    mode: u32,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    file.write_all(content.as_ref())?;
    Ok(())
}

/// Create `path` and any missing parents as owner-only directories.
///
/// An existing directory keeps its mode.
pub fn create_private_dir(path: &Path) -> Result<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
        .with_context(|| format!("Failed to create {}", path.display()))
}

/// Create a file that must not exist yet, with `mode` applied at creation.
///
/// Used for write-once documents: an existing file is an error, never overwritten.
pub fn write_new_file_mode<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
    mode: u32,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_ref())?;
    file.sync_all()?;
    Ok(())
}

/// Recursively copy `src` into `dst`, returning the number of files copied.
///
/// Files and directories land writable by the owner regardless of the
/// source permissions, since mounted media is read-only.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64> {
    if !src.is_dir() {
        bail!("Source tree {} is not a directory", src.display());
    }
    fs::create_dir_all(dst)?;

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            fs::set_permissions(&target, fs::Permissions::from_mode(0o755))?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
            fs::set_permissions(&target, fs::Permissions::from_mode(0o644))?;
            copied += 1;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            std::os::unix::fs::symlink(link, &target)?;
        }
    }
    Ok(copied)
}

/// Add owner write permission to every directory in a tree.
pub fn make_tree_writable(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).contents_first(false) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            let mut perms = entry.metadata()?.permissions();
            perms.set_mode(perms.mode() | 0o700);
            fs::set_permissions(entry.path(), perms)?;
        }
    }
    Ok(())
}
