//! Command-line implementations of the tool seams.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use super::{Archiver, BuildEngine, EngineJob, MediaTool, Registry};
use crate::media::BootArgs;
use crate::process::Cmd;

/// Loop-mounts images with `mount`/`umount` and composes with `xorriso`.
pub struct LoopMedia {
    compositor: String,
    volume_label: String,
}

impl LoopMedia {
    pub fn new(compositor: &str, volume_label: &str) -> Self {
        Self {
            compositor: compositor.to_string(),
            volume_label: volume_label.to_string(),
        }
    }

    /// Arguments for `xorriso -as mkisofs`.
    ///
    /// ISO level 3 is required because install payloads exceed 4 GiB.
    pub fn compose_args(&self, tree: &Path, boot: &BootArgs, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "-as",
            "mkisofs",
            "-iso-level",
            "3",
            "-full-iso9660-filenames",
            "-joliet",
            "-joliet-long",
            "-udf",
            "-volid",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(self.volume_label.clone());
        args.extend(boot.args().iter().cloned());
        args.push("-o".to_string());
        args.push(output.to_string_lossy().into_owned());
        args.push(tree.to_string_lossy().into_owned());
        args
    }
}

impl MediaTool for LoopMedia {
    fn mount(&self, image: &Path, mount_point: &Path) -> Result<()> {
        Cmd::new("mount")
            .args(["-o", "loop,ro"])
            .arg_path(image)
            .arg_path(mount_point)
            .error_msg(format!("Failed to mount {}", image.display()))
            .run()?;
        Ok(())
    }

    fn unmount(&self, mount_point: &Path) -> Result<()> {
        Cmd::new("umount")
            .arg_path(mount_point)
            .error_msg(format!("Failed to unmount {}", mount_point.display()))
            .run()?;
        Ok(())
    }

    fn compose(&self, tree: &Path, boot: &BootArgs, output: &Path) -> Result<()> {
        info!(output = %output.display(), mode = %boot.mode(), "composing bootable image");
        Cmd::new(&self.compositor)
            .args(self.compose_args(tree, boot, output))
            .error_msg(format!(
                "{} failed to compose {}",
                self.compositor,
                output.display()
            ))
            .run()?;
        Ok(())
    }
}

/// Drives `packer build`.
///
/// The administrator password reaches packer as `PKR_VAR_winrm_password`,
/// never on the command line.
pub struct Packer {
    program: String,
}

impl Packer {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    pub fn build_args(job: &EngineJob<'_>) -> Vec<String> {
        vec![
            "build".to_string(),
            "-force".to_string(),
            "-var".to_string(),
            format!("iso_path={}", job.image.display()),
            "-var".to_string(),
            format!("output_directory={}", job.output_dir.display()),
            "-var".to_string(),
            format!("switch_name={}", job.network),
            "-var".to_string(),
            format!("winrm_username={}", job.admin_username),
            job.engine_config.to_string_lossy().into_owned(),
        ]
    }
}

impl BuildEngine for Packer {
    fn build(&self, job: &EngineJob<'_>) -> Result<i32> {
        if let Some(parent) = job.log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let status = Cmd::new(&self.program)
            .args(Self::build_args(job))
            .env("PACKER_LOG", "1")
            .env("PACKER_LOG_PATH", job.log_path.to_string_lossy())
            .secret_env("PKR_VAR_winrm_password", job.admin_password.expose())
            .allow_fail()
            .run_streaming()?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Gzipped tarball via `tar`.
pub struct TarArchiver {
    program: String,
}

impl TarArchiver {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl Archiver for TarArchiver {
    fn archive(&self, dir: &Path, output: &Path) -> Result<()> {
        Cmd::new(&self.program)
            .arg("-czf")
            .arg_path(output)
            .arg("-C")
            .arg_path(dir)
            .arg(".")
            .error_msg(format!("Failed to archive {}", dir.display()))
            .run()
            .with_context(|| format!("Creating {}", output.display()))?;
        Ok(())
    }
}

/// `vagrant box add/remove`.
pub struct VagrantRegistry {
    program: String,
}

impl VagrantRegistry {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl Registry for VagrantRegistry {
    fn add(&self, name: &str, archive: &Path) -> Result<()> {
        Cmd::new(&self.program)
            .args(["box", "add", "--force", "--name", name])
            .arg_path(archive)
            .error_msg(format!("Failed to register box '{}'", name))
            .run()?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        Cmd::new(&self.program)
            .args(["box", "remove", "--force", "--all", name])
            .error_msg(format!("Failed to remove box '{}'", name))
            .run()?;
        Ok(())
    }
}
