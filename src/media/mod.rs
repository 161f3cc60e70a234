//! Installation media synthesis.
//!
//! Produces bootable installation images that carry the rendered unattended
//! descriptor at their root:
//!
//! - [`MediaSynthesizer::full_synthesize`] stages the pristine vendor image,
//!   installs the descriptor, no-prompt loaders and post-install scripts.
//! - [`MediaSynthesizer::incremental_patch`] restages a previously synthesized
//!   image and only replaces the descriptor, so credential rotation never has
//!   to read the (large, possibly removable) vendor image again.
//!
//! Both paths share the same boot detection, so their boot capability is
//! identical.

use std::path::{Path, PathBuf};

pub mod boot;
pub mod mount;
pub mod synth;

pub use boot::{BootArgs, BootFiles, BootMode};
pub use mount::MountGuard;
pub use synth::MediaSynthesizer;

/// File name the installer looks for at the media root.
pub const DESCRIPTOR_NAME: &str = "autounattend.xml";

/// Main installation payload; at least one must be present.
pub const PAYLOAD_FILES: [&str; 2] = ["sources/install.wim", "sources/install.esd"];

/// Where post-install scripts land inside the media tree.
pub const SCRIPTS_DEST: &str = "setup/scripts";

/// How the media for an attempt is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStrategy {
    /// Patch the descriptor of an existing synthesized image.
    Incremental,
    /// Build from the pristine source image.
    Full,
}

impl MediaStrategy {
    /// Incremental when a synthesized image is already on disk.
    pub fn select(image_path: &Path) -> Self {
        if image_path.is_file() {
            MediaStrategy::Incremental
        } else {
            MediaStrategy::Full
        }
    }

    /// Strategy to retry with after this one fails. At most one retry exists.
    pub fn fallback(self) -> Option<Self> {
        match self {
            MediaStrategy::Incremental => Some(MediaStrategy::Full),
            MediaStrategy::Full => None,
        }
    }
}

impl std::fmt::Display for MediaStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaStrategy::Incremental => f.write_str("incremental"),
            MediaStrategy::Full => f.write_str("full"),
        }
    }
}

/// A synthesized image on disk. Carries plaintext credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedImage {
    pub path: PathBuf,
    pub boot: BootArgs,
    pub strategy: MediaStrategy,
}

/// Temporary sibling an image is composed into before the atomic rename.
pub fn staging_path(image: &Path) -> PathBuf {
    let mut name = image
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "image".into());
    name.push(".tmp");
    image.with_file_name(name)
}
