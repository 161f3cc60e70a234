//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `build` - Build and register one version's box
//! - `status` - Box age and rebuild need per version
//! - `clean` - Remove scratch leftovers and build outputs
//! - `show` - Display configuration and resolved paths
//! - `preflight` - Run preflight checks

pub mod build;
pub mod clean;
mod preflight;
pub mod show;
pub mod status;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
pub use status::cmd_status;
