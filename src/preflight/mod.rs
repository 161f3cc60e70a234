//! Preflight checks for a goldbox host.
//!
//! Validates host tools, storage locations and every configured version's
//! inputs before a build starts. Run with `goldbox preflight`.

mod environment;
mod host_tools;
mod types;
mod validators;

use anyhow::{bail, Result};
use tracing::info;

use crate::config::Config;

pub use types::{Category, Check, PreflightReport, Status, Verdict};
pub use validators::{validate_descriptor_template, validate_engine_config};

/// Run all preflight checks.
pub fn run_preflight(config: &Config) -> PreflightReport {
    let mut report = PreflightReport::new();
    report.add(Category::Tools, host_tools::check_host_tools(&config.tools));
    report.add(Category::Storage, environment::check_storage(config));
    report.add(Category::Inputs, environment::check_versions(config));
    report
}

/// Run preflight and bail unless the host is ready. With `strict`, warnings fail too.
pub fn run_preflight_or_fail(config: &Config, strict: bool) -> Result<()> {
    info!(strict, "running preflight checks");
    let report = run_preflight(config);
    report.print(strict);

    let verdict = report.verdict(strict);
    if !verdict.is_ready() {
        bail!("Preflight {}. Fix the issues above before building.", verdict);
    }
    Ok(())
}
