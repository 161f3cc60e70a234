//! Clean command - removes scratch leftovers and build outputs.

use anyhow::Result;

use crate::clean::{self, CleanSummary};
use crate::config::Config;
use crate::tools::Toolchain;

/// Execute the clean command. `all` also removes outputs and boxes.
pub fn cmd_clean(config: &Config, all: bool) -> Result<()> {
    let summary = if all {
        let tools = Toolchain::system(config)?;
        clean::clean_all(config, tools.registry.as_ref())?
    } else {
        clean::clean_scratch(config)?
    };
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &CleanSummary) {
    for warning in &summary.warnings {
        println!("[WARN] {}", warning);
    }
    if summary.removed.is_empty() {
        println!("Nothing to clean.");
    } else {
        println!("Clean complete: {} item(s) removed.", summary.removed.len());
    }
    if !summary.skipped.is_empty() {
        println!("Skipped (build in progress): {}", summary.skipped.join(", "));
    }
}
