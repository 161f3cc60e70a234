//! Boot catalog detection.
//!
//! Which boot paths an image supports is decided purely from which boot
//! files exist in the staged tree. [`BootArgs::detect`] maps that set to the
//! compositor's El Torito arguments, preferring hybrid over BIOS-only over
//! EFI-only.

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{BuildError, BuildResult};

/// BIOS El Torito boot sector, relative to the media root.
pub const BIOS_BOOT_FILE: &str = "boot/etfsboot.com";

/// EFI system partition image, relative to the media root.
pub const EFI_BOOT_IMAGE: &str = "efi/microsoft/boot/efisys.bin";

/// Files that have a variant which boots without "Press any key".
/// `(primary, no-prompt variant)`.
pub const NO_PROMPT_SWAPS: [(&str, &str); 2] = [
    (
        "efi/microsoft/boot/cdboot.efi",
        "efi/microsoft/boot/cdboot_noprompt.efi",
    ),
    (
        "efi/microsoft/boot/efisys.bin",
        "efi/microsoft/boot/efisys_noprompt.bin",
    ),
];

/// Suffix appended to originals replaced by their no-prompt variant.
pub const PROMPT_BACKUP_SUFFIX: &str = ".prompt";

/// Boot file types present in a media tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootFiles {
    pub bios: bool,
    pub efi: bool,
}

impl BootFiles {
    /// Look for the BIOS and EFI boot files under `tree`.
    pub fn scan(tree: &Path) -> Self {
        Self {
            bios: tree.join(BIOS_BOOT_FILE).is_file(),
            efi: tree.join(EFI_BOOT_IMAGE).is_file(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    /// BIOS and UEFI.
    Hybrid,
    Bios,
    Efi,
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootMode::Hybrid => f.write_str("hybrid"),
            BootMode::Bios => f.write_str("bios"),
            BootMode::Efi => f.write_str("efi"),
        }
    }
}

/// Compositor boot arguments for one [`BootMode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootArgs {
    mode: BootMode,
    args: Vec<String>,
}

impl BootArgs {
    /// Pick the richest boot mode the files support.
    pub fn detect(files: &BootFiles) -> BuildResult<Self> {
        let mode = match (files.bios, files.efi) {
            (true, true) => BootMode::Hybrid,
            (true, false) => BootMode::Bios,
            (false, true) => BootMode::Efi,
            (false, false) => {
                return Err(BuildError::Media(format!(
                    "no bootable content: neither {} nor {} present",
                    BIOS_BOOT_FILE, EFI_BOOT_IMAGE
                )))
            }
        };

        let bios = [
            "-b",
            BIOS_BOOT_FILE,
            "-no-emul-boot",
            "-boot-load-size",
            "8",
        ];
        let efi = ["-e", EFI_BOOT_IMAGE, "-no-emul-boot"];

        let args: Vec<&str> = match mode {
            BootMode::Hybrid => bios
                .iter()
                .chain(["-eltorito-alt-boot"].iter())
                .chain(efi.iter())
                .copied()
                .collect(),
            BootMode::Bios => bios.to_vec(),
            BootMode::Efi => efi.to_vec(),
        };

        Ok(Self {
            mode,
            args: args.into_iter().map(String::from).collect(),
        })
    }

    pub fn mode(&self) -> BootMode {
        self.mode
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Swap in the no-prompt boot variants when all of them are present.
///
/// Originals are kept next to the swapped file with [`PROMPT_BACKUP_SUFFIX`].
/// Returns `false` (and leaves the tree untouched) if any variant is missing.
pub fn swap_no_prompt(tree: &Path) -> Result<bool> {
    let complete = NO_PROMPT_SWAPS
        .iter()
        .all(|(primary, variant)| tree.join(primary).is_file() && tree.join(variant).is_file());
    if !complete {
        warn!("no-prompt boot variants not all present; media will ask for a key press at boot");
        return Ok(false);
    }

    for (primary, variant) in NO_PROMPT_SWAPS {
        let primary = tree.join(primary);
        let backup = primary.with_file_name(format!(
            "{}{}",
            primary
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            PROMPT_BACKUP_SUFFIX
        ));
        if !backup.exists() {
            fs::rename(&primary, &backup)
                .with_context(|| format!("Failed to back up {}", primary.display()))?;
        }
        fs::copy(tree.join(variant), &primary)
            .with_context(|| format!("Failed to install no-prompt {}", primary.display()))?;
    }
    info!("installed no-prompt boot loaders");
    Ok(true)
}
