//! Environment descriptor shipped inside the box.
//!
//! The consuming automation logs in over WinRM, so the descriptor has to
//! carry one plaintext password. The rendered text is zeroed on drop.

use zeroize::Zeroizing;

use crate::credentials::Secret;

pub const VAGRANTFILE_NAME: &str = "Vagrantfile";

/// Values rendered into the descriptor.
pub struct DescriptorParams<'a> {
    pub artifact: &'a str,
    pub os_version: &'a str,
    pub provider: &'a str,
    pub username: &'a str,
    pub password: &'a Secret,
}

pub fn render(params: &DescriptorParams<'_>) -> Zeroizing<String> {
    let mut out = Zeroizing::new(String::with_capacity(capacity_for(params)));
    out.push_str("# -*- mode: ruby -*-\n");
    out.push_str(&format!(
        "# {} (OS version {}), packaged by goldbox.\n\n",
        params.artifact, params.os_version
    ));
    out.push_str("Vagrant.configure(\"2\") do |config|\n");
    out.push_str("  config.vm.guest = :windows\n");
    out.push_str("  config.vm.communicator = \"winrm\"\n");
    out.push_str("  config.vm.boot_timeout = 600\n");
    out.push_str("  config.winrm.transport = :plaintext\n");
    out.push_str("  config.winrm.basic_auth_only = true\n");
    setting(&mut out, "  config.winrm.username = ", params.username, "\n");
    setting(&mut out, "  config.winrm.password = ", params.password.expose(), "\n");
    setting(&mut out, "  config.vm.provider ", params.provider, " do |p|\n");
    out.push_str("  end\n");
    out.push_str("end\n");
    out
}

/// Upper bound on the rendered size, so `out` never reallocates and leaves a
/// stale copy of the password behind.
fn capacity_for(params: &DescriptorParams<'_>) -> usize {
    let values = [
        params.artifact,
        params.os_version,
        params.username,
        params.password.expose(),
        params.provider,
    ];
    512 + values.iter().map(|v| v.len() * 2 + 2).sum::<usize>()
}

fn setting(out: &mut String, prefix: &str, value: &str, suffix: &str) {
    out.push_str(prefix);
    push_ruby_single_quoted(out, value);
    out.push_str(suffix);
}

/// Ruby single-quoted literal: only `\` and `'` need escaping.
fn push_ruby_single_quoted(out: &mut String, value: &str) {
    out.push('\'');
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
}
