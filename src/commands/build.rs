//! Build command - builds and registers one version's box.

use anyhow::{bail, Result};
use std::time::Instant;

use crate::build::{BuildContext, Orchestrator};
use crate::config::Config;
use crate::timing::format_duration;
use crate::tools::Toolchain;

/// Execute the build command.
pub fn cmd_build(config: Config, version: &str, force: bool) -> Result<()> {
    println!("=== Golden Image Build: {} ===\n", version);
    let build_start = Instant::now();

    let tools = Toolchain::system(&config)?;
    let ctx = BuildContext::new(config, version, force, tools)?;
    let report = Orchestrator::run(&ctx);
    report.print();

    println!();
    println!("Total time: {}", format_duration(build_start.elapsed()));

    match report.error() {
        Some(e) => bail!("Build {} failed: {}", version, e.kind()),
        None => Ok(()),
    }
}
