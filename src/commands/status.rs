//! Status command - shows box age and whether a rebuild is due.

use anyhow::Result;
use std::time::SystemTime;

use crate::build::rebuild::{self, RebuildDecision};
use crate::config::Config;

/// Execute the status command for one version, or all of them.
pub fn cmd_status(config: &Config, version: Option<&str>) -> Result<()> {
    let versions: Vec<&str> = match version {
        Some(v) => vec![v],
        None => config.versions.keys().map(String::as_str).collect(),
    };

    println!("Rebuild interval: {} day(s)\n", config.rebuild_interval_days);
    let now = SystemTime::now();
    for tag in versions {
        let paths = match config.resolve(tag) {
            Ok(paths) => paths,
            Err(e) => {
                println!("  {:<12} ERROR  {}", tag, e);
                continue;
            }
        };

        let decision = rebuild::decide(&paths.box_path, config.rebuild_interval(), false, now);
        let state = match decision {
            RebuildDecision::UpToDate { .. } => "fresh",
            RebuildDecision::Stale { .. } => "stale",
            RebuildDecision::Missing => "missing",
            RebuildDecision::Forced => "forced",
        };
        println!("  {:<12} {:<7} {}", tag, state, decision);
        println!("  {:<12}         box:   {}", "", paths.box_path.display());
        if paths.lease_path.exists() {
            println!("  {:<12}         lease: held ({})", "", paths.lease_path.display());
        }
        if paths.image_path.exists() {
            println!("  {:<12}         leftover image: {}", "", paths.image_path.display());
        }
    }
    Ok(())
}
