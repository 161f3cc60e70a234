//! Seams to the external programs a build drives.
//!
//! The orchestrator never spawns a process directly; it calls through these
//! traits. [`Toolchain::system`] wires the real command-line tools, and tests
//! substitute in-process fakes.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::credentials::{PassphraseCommand, Secret};
use crate::media::BootArgs;

pub mod system;

pub use system::{LoopMedia, Packer, TarArchiver, VagrantRegistry};

/// Mounting and composing bootable installation images.
pub trait MediaTool {
    /// Attach `image` read-only at the existing, empty directory `mount_point`.
    fn mount(&self, image: &Path, mount_point: &Path) -> Result<()>;

    /// Detach whatever is mounted at `mount_point`.
    fn unmount(&self, mount_point: &Path) -> Result<()>;

    /// Write a bootable image of `tree` to `output` using `boot` arguments.
    fn compose(&self, tree: &Path, boot: &BootArgs, output: &Path) -> Result<()>;
}

/// High-entropy passphrase generator.
pub trait SecretSource {
    /// Produce one fresh passphrase. Empty results are the caller's to reject.
    fn generate(&self) -> Result<Secret>;
}

/// Inputs for one build-engine run.
#[derive(Debug)]
pub struct EngineJob<'a> {
    pub engine_config: &'a Path,
    pub image: &'a Path,
    pub output_dir: &'a Path,
    pub network: &'a str,
    pub log_path: &'a Path,
    pub admin_username: &'a str,
    pub admin_password: &'a Secret,
}

/// The external VM build engine.
pub trait BuildEngine {
    /// Run to completion and return the exit code. Spawn failures are errors.
    fn build(&self, job: &EngineJob<'_>) -> Result<i32>;
}

/// Turns a staged box directory into a single archive file.
pub trait Archiver {
    fn archive(&self, dir: &Path, output: &Path) -> Result<()>;
}

/// External artifact registry.
pub trait Registry {
    /// Register `archive` under `name`, replacing any existing registration.
    fn add(&self, name: &str, archive: &Path) -> Result<()>;

    fn remove(&self, name: &str) -> Result<()>;
}

/// Every external collaborator of a build.
pub struct Toolchain {
    pub media: Box<dyn MediaTool>,
    pub secrets: Box<dyn SecretSource>,
    pub engine: Box<dyn BuildEngine>,
    pub archiver: Box<dyn Archiver>,
    pub registry: Box<dyn Registry>,
}

impl Toolchain {
    /// Real command-line tools named in the configuration.
    pub fn system(config: &Config) -> Result<Self> {
        let tools = &config.tools;
        Ok(Self {
            media: Box::new(LoopMedia::new(&tools.compositor, &tools.volume_label)),
            secrets: Box::new(PassphraseCommand::from_argv(&tools.passphrase)?),
            engine: Box::new(Packer::new(&tools.engine)),
            archiver: Box::new(TarArchiver::new(&tools.archiver)),
            registry: Box::new(VagrantRegistry::new(&tools.registry)),
        })
    }
}
