//! Shared test utilities for goldbox tests.
//!
//! External tools are replaced by in-process fakes. A fake "image" is a
//! JSON document `{"boot_args": [...] | null, "files": {"rel/path": "text"}}`:
//! mounting writes the files out, composing serializes a tree back, so
//! full synthesis, patching and verification run unchanged.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;
use walkdir::WalkDir;

use goldbox::build::BuildContext;
use goldbox::config::{Config, PathSet};
use goldbox::credentials::Secret;
use goldbox::media::BootArgs;
use goldbox::tools::{Archiver, BuildEngine, EngineJob, MediaTool, Registry, SecretSource, Toolchain};

pub const VERSION: &str = "2022";

pub const TEMPLATE: &str = "<unattend>\n  <Administrator>{{ADMIN_PASSWORD}}</Administrator>\n  <LocalAccount>{{USER_PASSWORD}}</LocalAccount>\n</unattend>\n";

/// Files of a hybrid-bootable vendor image, including no-prompt variants.
pub const HYBRID_SOURCE: &[(&str, &str)] = &[
    ("boot/etfsboot.com", "bios-boot"),
    ("efi/microsoft/boot/efisys.bin", "efi-prompt"),
    ("efi/microsoft/boot/efisys_noprompt.bin", "efi-noprompt"),
    ("efi/microsoft/boot/cdboot.efi", "cdboot-prompt"),
    ("efi/microsoft/boot/cdboot_noprompt.efi", "cdboot-noprompt"),
    ("sources/install.wim", "payload"),
    ("setup.exe", "setup"),
];

// =============================================================================
// Fake images
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FakeImage {
    pub boot_args: Option<Vec<String>>,
    pub files: BTreeMap<String, String>,
}

impl FakeImage {
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading fake image {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("corrupt image {}", path.display()))
    }

    pub fn file(&self, rel: &str) -> Option<&str> {
        self.files.get(rel).map(String::as_str)
    }
}

/// Write a vendor image holding `files`.
pub fn write_source_image(path: &Path, files: &[(&str, &str)]) {
    let image = FakeImage {
        boot_args: None,
        files: files
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    };
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(&image).unwrap()).unwrap();
}

// =============================================================================
// Fakes
// =============================================================================

/// Every external call, in order, e.g. `mount`, `compose`, `engine`.
pub type CallLog = Rc<RefCell<Vec<String>>>;

pub struct FakeMedia {
    pub calls: CallLog,
}

impl MediaTool for FakeMedia {
    fn mount(&self, image: &Path, mount_point: &Path) -> Result<()> {
        self.calls.borrow_mut().push("mount".to_string());
        let fake = FakeImage::read(image)?;
        for (rel, content) in &fake.files {
            let dest = mount_point.join(rel);
            fs::create_dir_all(dest.parent().unwrap())?;
            fs::write(dest, content)?;
        }
        Ok(())
    }

    fn unmount(&self, mount_point: &Path) -> Result<()> {
        self.calls.borrow_mut().push("unmount".to_string());
        if mount_point.exists() {
            fs::remove_dir_all(mount_point)?;
        }
        Ok(())
    }

    fn compose(&self, tree: &Path, boot: &BootArgs, output: &Path) -> Result<()> {
        self.calls.borrow_mut().push("compose".to_string());
        let mut files = BTreeMap::new();
        for entry in WalkDir::new(tree).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(tree)?.to_string_lossy().replace('\\', "/");
            files.insert(rel, fs::read_to_string(entry.path())?);
        }
        let image = FakeImage {
            boot_args: Some(boot.args().to_vec()),
            files,
        };
        fs::write(output, serde_json::to_string_pretty(&image)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretMode {
    Distinct,
    Fail,
    Empty,
    Duplicate,
}

pub struct FakeSecrets {
    pub calls: CallLog,
    pub mode: SecretMode,
    pub counter: Cell<u32>,
}

impl SecretSource for FakeSecrets {
    fn generate(&self) -> Result<Secret> {
        self.calls.borrow_mut().push("secret".to_string());
        let n = self.counter.get() + 1;
        self.counter.set(n);
        match self.mode {
            SecretMode::Distinct => Ok(Secret::new(format!("pw-{}-{}", n, uuid::Uuid::new_v4().simple()))),
            SecretMode::Fail => bail!("generator not installed"),
            SecretMode::Empty => Ok(Secret::new(String::new())),
            SecretMode::Duplicate => Ok(Secret::new("same-every-time".to_string())),
        }
    }
}

/// What the engine saw on each run.
#[derive(Debug, Clone)]
pub struct EngineRun {
    pub descriptor: String,
    pub boot_args: Vec<String>,
    pub admin_password: String,
    pub network: String,
}

pub struct FakeEngine {
    pub calls: CallLog,
    pub exit_code: i32,
    pub disks: usize,
    pub runs: Rc<RefCell<Vec<EngineRun>>>,
}

impl BuildEngine for FakeEngine {
    fn build(&self, job: &EngineJob<'_>) -> Result<i32> {
        self.calls.borrow_mut().push("engine".to_string());
        let image = FakeImage::read(job.image)?;
        self.runs.borrow_mut().push(EngineRun {
            descriptor: image.file("autounattend.xml").unwrap_or_default().to_string(),
            boot_args: image.boot_args.clone().unwrap_or_default(),
            admin_password: job.admin_password.expose().to_string(),
            network: job.network.to_string(),
        });

        let log: String = (1..=30).map(|i| format!("engine line {}\n", i)).collect();
        fs::write(job.log_path, log)?;

        if self.exit_code == 0 {
            let disks = job.output_dir.join("Virtual Hard Disks");
            fs::create_dir_all(&disks)?;
            for i in 0..self.disks {
                fs::write(disks.join(format!("disk{}.vhdx", i)), "x".repeat(64 * (i + 1)))?;
            }
        }
        Ok(self.exit_code)
    }
}

pub struct FakeArchiver {
    pub calls: CallLog,
    pub fail: bool,
    /// Vagrantfile content of every archived box.
    pub vagrantfiles: Rc<RefCell<Vec<String>>>,
}

impl Archiver for FakeArchiver {
    fn archive(&self, dir: &Path, output: &Path) -> Result<()> {
        self.calls.borrow_mut().push("archive".to_string());
        if self.fail {
            bail!("tar: write error");
        }
        self.vagrantfiles
            .borrow_mut()
            .push(fs::read_to_string(dir.join("Vagrantfile"))?);
        let mut names: Vec<String> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        fs::write(output, names.join("\n"))?;
        Ok(())
    }
}

pub struct FakeRegistry {
    pub calls: CallLog,
    pub fail: bool,
}

impl Registry for FakeRegistry {
    fn add(&self, name: &str, archive: &Path) -> Result<()> {
        self.calls.borrow_mut().push(format!("registry add {}", name));
        if self.fail {
            return Err(anyhow!("registry unavailable"));
        }
        if !archive.is_file() {
            bail!("archive missing: {}", archive.display());
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.calls.borrow_mut().push(format!("registry remove {}", name));
        Ok(())
    }
}

/// Knobs and shared observations for one toolchain of fakes.
pub struct FakeTools {
    pub calls: CallLog,
    pub secrets: SecretMode,
    pub engine_exit: i32,
    pub engine_disks: usize,
    pub archive_fails: bool,
    pub registry_fails: bool,
    pub engine_runs: Rc<RefCell<Vec<EngineRun>>>,
    pub vagrantfiles: Rc<RefCell<Vec<String>>>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            secrets: SecretMode::Distinct,
            engine_exit: 0,
            engine_disks: 1,
            archive_fails: false,
            registry_fails: false,
            engine_runs: Rc::new(RefCell::new(Vec::new())),
            vagrantfiles: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            media: Box::new(FakeMedia {
                calls: self.calls.clone(),
            }),
            secrets: Box::new(FakeSecrets {
                calls: self.calls.clone(),
                mode: self.secrets,
                counter: Cell::new(0),
            }),
            engine: Box::new(FakeEngine {
                calls: self.calls.clone(),
                exit_code: self.engine_exit,
                disks: self.engine_disks,
                runs: self.engine_runs.clone(),
            }),
            archiver: Box::new(FakeArchiver {
                calls: self.calls.clone(),
                fail: self.archive_fails,
                vagrantfiles: self.vagrantfiles.clone(),
            }),
            registry: Box::new(FakeRegistry {
                calls: self.calls.clone(),
                fail: self.registry_fails,
            }),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

// =============================================================================
// Test environment
// =============================================================================

/// Temporary storage, scratch and inputs for one configured version.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    pub root: PathBuf,
    pub storage: PathBuf,
    pub scratch: PathBuf,
    pub source_image: PathBuf,
    pub template: PathBuf,
}

impl TestEnv {
    /// Hybrid-bootable source, valid template and engine config.
    pub fn new() -> Self {
        Self::with_source(HYBRID_SOURCE)
    }

    pub fn with_source(files: &[(&str, &str)]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let inputs = root.join("inputs");
        fs::create_dir_all(&inputs).unwrap();

        let source_image = inputs.join("win2022.iso");
        write_source_image(&source_image, files);
        let template = inputs.join("autounattend.xml.tmpl");
        fs::write(&template, TEMPLATE).unwrap();
        fs::write(inputs.join("win2022.pkr.hcl"), "source \"hyperv-iso\" \"win\" {}\n").unwrap();

        Self {
            storage: root.join("storage"),
            scratch: root.join("scratch"),
            _temp_dir: temp_dir,
            root,
            source_image,
            template,
        }
    }

    pub fn config(&self) -> Config {
        let json = format!(
            r#"{{
                "storage_root": "{storage}",
                "scratch_root": "{scratch}",
                "rebuild_interval_days": 30,
                "network_switch": "Default Switch",
                "scratch_grace_hours": 24,
                "versions": {{
                    "{version}": {{
                        "source_image": "inputs/win2022.iso",
                        "descriptor_template": "inputs/autounattend.xml.tmpl",
                        "engine_config": "inputs/win2022.pkr.hcl"
                    }}
                }}
            }}"#,
            storage = self.storage.display(),
            scratch = self.scratch.display(),
            version = VERSION,
        );
        Config::from_json(&json, &self.root).expect("test config")
    }

    pub fn paths(&self) -> PathSet {
        self.config().resolve(VERSION).expect("resolve test version")
    }

    pub fn context(&self, tools: &FakeTools, force: bool) -> BuildContext {
        BuildContext::new(self.config(), VERSION, force, tools.toolchain()).expect("build context")
    }

    /// Entries left under the scratch root.
    pub fn scratch_entries(&self) -> Vec<String> {
        match fs::read_dir(&self.scratch) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Credential records written so far.
    pub fn records(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.storage.join("credentials")) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Write a rendered descriptor file and return its path.
pub fn write_descriptor(dir: &Path, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Assert a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}

/// Assert a path does not exist.
pub fn assert_absent(path: &Path) {
    assert!(!path.exists(), "Expected path to be gone: {}", path.display());
}
