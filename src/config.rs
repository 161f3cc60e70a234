//! Configuration document and per-version path resolution.
//!
//! Configuration lives in a JSON document (`goldbox.json` by default).
//! A `.env` file is loaded first by the binary; the `GOLDBOX_*` environment
//! variables below take precedence over the document:
//!
//! - `GOLDBOX_STORAGE_ROOT` - persistent storage (boxes, credential records, logs)
//! - `GOLDBOX_SCRATCH_ROOT` - fast local scratch space for media staging
//! - `GOLDBOX_REBUILD_DAYS` - rebuild interval in days
//!
//! [`Config::resolve`] turns one version entry into an immutable [`PathSet`].
//! Path templates may reference `{version}` and `{storage}`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BuildError, BuildResult};

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "goldbox.json";

const DEFAULT_IMAGE_NAME: &str = "{version}-unattended.iso";
const DEFAULT_OUTPUT_DIR: &str = "{storage}/output/{version}";
const DEFAULT_ARTIFACT_NAME: &str = "golden-{version}";

/// Global settings plus one entry per OS version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,
    #[serde(default = "default_rebuild_days")]
    pub rebuild_interval_days: u64,
    /// Virtual switch / network the build engine attaches the VM to.
    pub network_switch: String,
    /// Extension of the disk files the engine produces.
    #[serde(default = "default_disk_format")]
    pub disk_format: String,
    /// Provider name written into box metadata.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_scratch_grace_hours")]
    pub scratch_grace_hours: u64,
    #[serde(default = "default_lease_timeout_hours")]
    pub lease_timeout_hours: u64,
    /// Post-install scripts overlaid onto the media, if any.
    #[serde(default)]
    pub scripts_dir: Option<PathBuf>,
    #[serde(default)]
    pub usernames: Usernames,
    #[serde(default)]
    pub tools: ToolsConfig,
    pub versions: BTreeMap<String, VersionEntry>,
    /// Directory of the document; relative `output_dir` templates resolve here.
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Account names embedded in the descriptor and the credential record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usernames {
    pub administrator: String,
    pub user: String,
}

impl Default for Usernames {
    fn default() -> Self {
        Self {
            administrator: "Administrator".to_string(),
            user: "vagrant".to_string(),
        }
    }
}

/// External programs. Each is a program name or path looked up in PATH.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Passphrase generator and its arguments. Must print the secret on stdout.
    pub passphrase: Vec<String>,
    pub compositor: String,
    pub volume_label: String,
    pub engine: String,
    pub archiver: String,
    pub registry: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            passphrase: vec![
                "pwgen".to_string(),
                "-s".to_string(),
                "-y".to_string(),
                "32".to_string(),
                "1".to_string(),
            ],
            compositor: "xorriso".to_string(),
            volume_label: "GOLDBOX".to_string(),
            engine: "packer".to_string(),
            archiver: "tar".to_string(),
            registry: "vagrant".to_string(),
        }
    }
}

/// Per-version inputs. Optional fields fall back to the default templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Pristine vendor installation image.
    pub source_image: PathBuf,
    /// Unattended descriptor with credential placeholders.
    pub descriptor_template: PathBuf,
    /// Build-engine template.
    pub engine_config: PathBuf,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub artifact_name: Option<String>,
}

/// Every path one build invocation touches. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    pub version: String,
    pub source_image: PathBuf,
    pub descriptor_template: PathBuf,
    pub engine_config: PathBuf,
    pub image_name: String,
    /// `<scratch_root>/<image_name>`; carries plaintext credentials while it exists.
    pub image_path: PathBuf,
    pub output_dir: PathBuf,
    pub artifact_name: String,
    /// Persistent location of the packaged box.
    pub box_path: PathBuf,
    /// Advisory lease guarding `output_dir` across invocations.
    pub lease_path: PathBuf,
    /// Build engine log for this version.
    pub engine_log: PathBuf,
}

fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("goldbox")
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("goldbox-scratch")
}

fn default_rebuild_days() -> u64 {
    30
}

fn default_disk_format() -> String {
    "vhdx".to_string()
}

fn default_provider() -> String {
    "hyperv".to_string()
}

fn default_scratch_grace_hours() -> u64 {
    24
}

fn default_lease_timeout_hours() -> u64 {
    12
}

impl Config {
    /// Load the document at `path` and apply environment overrides.
    ///
    /// Relative paths in the document are resolved against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&content, base_dir)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse a document, resolving relative paths against `base_dir`.
    pub fn from_json(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Config = serde_json::from_str(content)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.absolutize(base_dir);
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(root) = lookup("GOLDBOX_STORAGE_ROOT") {
            self.storage_root = PathBuf::from(root);
        }
        if let Some(root) = lookup("GOLDBOX_SCRATCH_ROOT") {
            self.scratch_root = PathBuf::from(root);
        }
        if let Some(days) = lookup("GOLDBOX_REBUILD_DAYS") {
            self.rebuild_interval_days = days
                .trim()
                .parse()
                .with_context(|| format!("GOLDBOX_REBUILD_DAYS is not a number: {}", days))?;
        }
        Ok(())
    }

    fn absolutize(&mut self, base_dir: &Path) {
        let abs = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base_dir.join(p)
            }
        };
        self.base_dir = base_dir.to_path_buf();
        self.storage_root = abs(&self.storage_root);
        self.scratch_root = abs(&self.scratch_root);
        self.scripts_dir = self.scripts_dir.as_deref().map(abs);
        for entry in self.versions.values_mut() {
            entry.source_image = abs(&entry.source_image);
            entry.descriptor_template = abs(&entry.descriptor_template);
            entry.engine_config = abs(&entry.engine_config);
        }
    }

    pub fn rebuild_interval(&self) -> Duration {
        Duration::from_secs(self.rebuild_interval_days.saturating_mul(24 * 60 * 60))
    }

    pub fn scratch_grace(&self) -> Duration {
        Duration::from_secs(self.scratch_grace_hours.saturating_mul(60 * 60))
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_hours.saturating_mul(60 * 60))
    }

    /// Directory holding packaged boxes.
    pub fn box_dir(&self) -> PathBuf {
        self.storage_root.join("boxes")
    }

    /// Directory holding credential records.
    pub fn credentials_dir(&self) -> PathBuf {
        self.storage_root.join("credentials")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.storage_root.join("logs")
    }

    /// Resolve one version into its [`PathSet`].
    ///
    /// Fails with a validation error if the version is unknown or if the
    /// descriptor template or engine config is missing. The source image is
    /// only checked when full synthesis actually needs it.
    pub fn resolve(&self, version: &str) -> BuildResult<PathSet> {
        let entry = self.versions.get(version).ok_or_else(|| {
            BuildError::Validation(format!(
                "unknown version '{}' (configured: {})",
                version,
                self.versions.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })?;

        for (what, path) in [
            ("descriptor template", &entry.descriptor_template),
            ("engine config", &entry.engine_config),
        ] {
            if !path.is_file() {
                return Err(BuildError::Validation(format!(
                    "{} not found: {}",
                    what,
                    path.display()
                )));
            }
        }

        let storage = self.storage_root.to_string_lossy();
        let expand = |template: &str| {
            template
                .replace("{version}", version)
                .replace("{storage}", &storage)
        };

        let image_name = expand(entry.image_name.as_deref().unwrap_or(DEFAULT_IMAGE_NAME));
        if image_name.contains('/') || image_name.is_empty() {
            return Err(BuildError::Validation(format!(
                "image name must be a plain file name: '{}'",
                image_name
            )));
        }
        let output_dir = self.base_dir.join(expand(
            entry.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR),
        ));
        let artifact_name = expand(
            entry
                .artifact_name
                .as_deref()
                .unwrap_or(DEFAULT_ARTIFACT_NAME),
        );
        if artifact_name.trim().is_empty() {
            return Err(BuildError::Validation("artifact name is empty".to_string()));
        }

        let box_file = format!("{}.box", crate::package::sanitize_name(&artifact_name));
        let lease_path = lease_path_for(&output_dir);

        Ok(PathSet {
            version: version.to_string(),
            source_image: entry.source_image.clone(),
            descriptor_template: entry.descriptor_template.clone(),
            engine_config: entry.engine_config.clone(),
            image_path: self.scratch_root.join(&image_name),
            image_name,
            output_dir,
            box_path: self.box_dir().join(box_file),
            artifact_name,
            lease_path,
            engine_log: self.log_dir().join(format!("{}-engine.log", version)),
        })
    }

    /// Print configuration for `goldbox show config`.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  storage_root:          {}", self.storage_root.display());
        println!("  scratch_root:          {}", self.scratch_root.display());
        println!("  rebuild_interval_days: {}", self.rebuild_interval_days);
        println!("  network_switch:        {}", self.network_switch);
        println!("  disk_format:           {}", self.disk_format);
        println!("  provider:              {}", self.provider);
        match &self.scripts_dir {
            Some(dir) => println!("  scripts_dir:           {}", dir.display()),
            None => println!("  scripts_dir:           (none)"),
        }
        println!("  tools:");
        println!("    passphrase: {}", self.tools.passphrase.join(" "));
        println!("    compositor: {}", self.tools.compositor);
        println!("    engine:     {}", self.tools.engine);
        println!("    archiver:   {}", self.tools.archiver);
        println!("    registry:   {}", self.tools.registry);
        println!("  versions:");
        for (tag, entry) in &self.versions {
            println!("    {}: {}", tag, entry.source_image.display());
        }
    }
}

/// `<output_dir>.lease`, next to the directory it guards.
fn lease_path_for(output_dir: &Path) -> PathBuf {
    let mut name = output_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".lease");
    output_dir.with_file_name(name)
}
