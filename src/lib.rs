//! goldbox library.
//!
//! Every module is public so integration tests can drive the orchestrator
//! with in-process fakes for the external tools.

pub mod build;
pub mod clean;
pub mod commands;
pub mod common;
pub mod config;
pub mod credentials;
pub mod error;
pub mod media;
pub mod package;
pub mod preflight;
pub mod process;
pub mod timing;
pub mod tools;

pub use error::{BuildError, BuildResult, CleanupWarning};
