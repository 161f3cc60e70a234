//! Build context shared across every stage of one invocation.

use crate::config::{Config, PathSet};
use crate::error::BuildResult;
use crate::tools::Toolchain;

/// Constructed once per invocation and passed by reference.
pub struct BuildContext {
    pub config: Config,
    /// Resolved paths for the version being built.
    pub paths: PathSet,
    /// Rebuild even if the existing box is fresh.
    pub force: bool,
    pub tools: Toolchain,
}

impl BuildContext {
    /// Resolve `version` against `config`.
    ///
    /// Unknown versions and missing input files fail here, before any
    /// external program runs.
    pub fn new(config: Config, version: &str, force: bool, tools: Toolchain) -> BuildResult<Self> {
        let paths = config.resolve(version)?;
        Ok(Self {
            config,
            paths,
            force,
            tools,
        })
    }
}
