//! Host tool availability checks.

use crate::config::ToolsConfig;
use crate::process;

use super::types::Check;

/// Check the configured external programs are installed.
pub fn check_host_tools(tools: &ToolsConfig) -> Vec<Check> {
    let mut results = Vec::new();

    match tools.passphrase.first() {
        Some(generator) => results.push(check_tool_exists(
            generator,
            "Required to generate per-build passwords",
            true,
        )),
        None => results.push(Check::fail(
            "passphrase generator",
            "tools.passphrase is empty",
        )),
    }

    let required = [
        (tools.compositor.as_str(), "Required to compose installation media"),
        (tools.engine.as_str(), "Required to build the VM disk"),
        (tools.archiver.as_str(), "Required to archive boxes"),
        (tools.registry.as_str(), "Required to register boxes"),
        ("mount", "Required to read installation media"),
        ("umount", "Required to read installation media"),
    ];
    for (tool, purpose) in required {
        results.push(check_tool_exists(tool, purpose, true));
    }

    results.push(check_mount_privileges());
    results
}

/// Check if a tool exists in PATH.
fn check_tool_exists(tool: &str, purpose: &str, required: bool) -> Check {
    match process::which(tool) {
        Some(path) => Check::pass_with(tool, &path.display().to_string()),
        None => {
            let msg = format!("Not found in PATH. {}", purpose);
            if required {
                Check::fail(tool, &msg)
            } else {
                Check::warn(tool, &msg)
            }
        }
    }
}

/// Loop mounts need root on most hosts.
fn check_mount_privileges() -> Check {
    let uid = std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status
                .lines()
                .find(|l| l.starts_with("Uid:"))
                .and_then(|l| l.split_whitespace().nth(2).map(str::to_string))
        });
    match uid.as_deref() {
        Some("0") => Check::pass("loop mount privileges"),
        Some(_) => Check::warn(
            "loop mount privileges",
            "Not running as root - `mount -o loop` will likely fail",
        ),
        None => Check::skip("loop mount privileges", "cannot determine effective uid"),
    }
}
