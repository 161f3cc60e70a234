//! Storage locations and per-version inputs.

use std::fs;
use std::path::Path;

use crate::common::create_private_dir;
use crate::config::Config;
use crate::process::Cmd;

use super::types::Check;
use super::validators::{validate_descriptor_template, validate_engine_config};

/// Free space below which the scratch root gets a warning. Media staging
/// holds a full copy of the installation tree plus the composed image.
const MIN_SCRATCH_FREE_GB: u64 = 20;

/// Check storage and scratch roots are writable and scratch has room.
pub fn check_storage(config: &Config) -> Vec<Check> {
    let mut results = vec![
        check_writable("storage_root", &config.storage_root),
        check_writable("scratch_root", &config.scratch_root),
    ];

    match &config.scripts_dir {
        Some(dir) if dir.is_dir() => results.push(Check::pass_with("scripts_dir", &dir.display().to_string())),
        Some(dir) => results.push(Check::warn(
            "scripts_dir",
            &format!("{} not found - scripts will not be overlaid", dir.display()),
        )),
        None => {}
    }

    if let Some(check) = check_free_space(&config.scratch_root) {
        results.push(check);
    }
    results
}

/// Check every configured version's source image, template and engine config.
pub fn check_versions(config: &Config) -> Vec<Check> {
    let mut results = Vec::new();
    if config.versions.is_empty() {
        results.push(Check::fail("versions", "no versions configured"));
        return results;
    }

    for (tag, entry) in &config.versions {
        let name = format!("{}: source image", tag);
        if entry.source_image.is_file() {
            results.push(Check::pass(&name));
        } else {
            results.push(Check::fail(
                &name,
                &format!("{} not found", entry.source_image.display()),
            ));
        }

        let name = format!("{}: descriptor template", tag);
        match validate_descriptor_template(&entry.descriptor_template) {
            Ok(0) => results.push(Check::pass(&name)),
            Ok(unknown) => results.push(Check::warn(
                &name,
                &format!("{} unknown placeholder(s) will be left verbatim", unknown),
            )),
            Err(e) => results.push(Check::fail(&name, &e)),
        }

        let name = format!("{}: engine config", tag);
        match validate_engine_config(&entry.engine_config) {
            Ok(lines) => results.push(Check::pass_with(&name, &format!("{} lines", lines))),
            Err(e) => results.push(Check::fail(&name, &e)),
        }

        if let Err(e) = config.resolve(tag) {
            results.push(Check::fail(&format!("{}: paths", tag), &e.to_string()));
        }
    }
    results
}

fn check_writable(name: &str, dir: &Path) -> Check {
    if let Err(e) = create_private_dir(dir) {
        return Check::fail(name, &format!("{:#}", e));
    }
    let marker = dir.join(".goldbox-preflight");
    match fs::write(&marker, "test") {
        Ok(()) => {
            let _ = fs::remove_file(&marker);
            Check::pass_with(name, &dir.display().to_string())
        }
        Err(e) => Check::fail(name, &format!("Cannot write to {}: {}", dir.display(), e)),
    }
}

fn check_free_space(dir: &Path) -> Option<Check> {
    let result = Cmd::new("df")
        .args(["--output=avail", "-B1"])
        .arg_path(dir)
        .allow_fail()
        .run()
        .ok()?;
    if !result.success() {
        return None;
    }
    let avail: u64 = result.stdout.lines().nth(1)?.trim().parse().ok()?;
    let free_gb = avail / (1024 * 1024 * 1024);
    Some(if free_gb < MIN_SCRATCH_FREE_GB {
        Check::warn(
            "scratch space",
            &format!("{}GB free - media staging needs ~{}GB", free_gb, MIN_SCRATCH_FREE_GB),
        )
    } else {
        Check::pass_with("scratch space", &format!("{}GB free", free_gb))
    })
}
