//! Preflight report: checks grouped by what they cover, plus a verdict.

use std::fmt;

/// What a group of checks covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// External programs the build shells out to.
    Tools,
    /// Storage and scratch roots.
    Storage,
    /// Per-version source images, templates and engine configs.
    Inputs,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Tools => "Host tools",
            Category::Storage => "Storage",
            Category::Inputs => "Version inputs",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    /// Usable, but a build may misbehave. Fatal under `--strict`.
    Warn,
    /// A build cannot succeed.
    Fail,
    /// Not applicable on this host.
    Skip,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Warn => "WARN",
            Status::Fail => "FAIL",
            Status::Skip => "SKIP",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub status: Status,
    pub detail: Option<String>,
}

impl Check {
    fn new(name: &str, status: Status, detail: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.map(str::to_string),
        }
    }

    pub fn pass(name: &str) -> Self {
        Self::new(name, Status::Pass, None)
    }

    pub fn pass_with(name: &str, detail: &str) -> Self {
        Self::new(name, Status::Pass, Some(detail))
    }

    pub fn warn(name: &str, detail: &str) -> Self {
        Self::new(name, Status::Warn, Some(detail))
    }

    pub fn fail(name: &str, detail: &str) -> Self {
        Self::new(name, Status::Fail, Some(detail))
    }

    pub fn skip(name: &str, detail: &str) -> Self {
        Self::new(name, Status::Skip, Some(detail))
    }
}

/// Whether the host may start a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ready,
    ReadyWithWarnings(usize),
    Blocked { failed: usize, warned: usize, strict: bool },
}

impl Verdict {
    pub fn is_ready(self) -> bool {
        !matches!(self, Verdict::Blocked { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Verdict::Ready => write!(f, "ready to build"),
            Verdict::ReadyWithWarnings(n) => write!(f, "ready to build, {} warning(s)", n),
            Verdict::Blocked { failed, warned, strict } => {
                write!(f, "blocked: {} failed, {} warning(s)", failed, warned)?;
                if strict && failed == 0 {
                    write!(f, " (warnings are fatal with --strict)")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct PreflightReport {
    sections: Vec<(Category, Vec<Check>)>,
}

impl PreflightReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, category: Category, checks: Vec<Check>) {
        self.sections.push((category, checks));
    }

    pub fn checks(&self) -> impl Iterator<Item = &Check> {
        self.sections.iter().flat_map(|(_, checks)| checks)
    }

    pub fn count(&self, status: Status) -> usize {
        self.checks().filter(|c| c.status == status).count()
    }

    pub fn verdict(&self, strict: bool) -> Verdict {
        let failed = self.count(Status::Fail);
        let warned = self.count(Status::Warn);
        if failed > 0 || (strict && warned > 0) {
            Verdict::Blocked { failed, warned, strict }
        } else if warned > 0 {
            Verdict::ReadyWithWarnings(warned)
        } else {
            Verdict::Ready
        }
    }

    pub fn print(&self, strict: bool) {
        for (category, checks) in &self.sections {
            println!("{}:", category);
            for check in checks {
                match &check.detail {
                    Some(detail) => println!("  [{}] {}: {}", check.status.label(), check.name, detail),
                    None => println!("  [{}] {}", check.status.label(), check.name),
                }
            }
        }
        println!("\nPreflight: {}", self.verdict(strict));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(checks: Vec<Check>) -> PreflightReport {
        let mut report = PreflightReport::new();
        report.add(Category::Tools, checks);
        report
    }

    #[test]
    fn test_warnings_only_block_when_strict() {
        let report = report(vec![Check::pass("xorriso"), Check::warn("scripts_dir", "missing")]);
        assert_eq!(report.verdict(false), Verdict::ReadyWithWarnings(1));
        let strict = report.verdict(true);
        assert!(!strict.is_ready());
        assert!(strict.to_string().contains("--strict"));
    }

    #[test]
    fn test_failure_blocks() {
        let report = report(vec![Check::fail("packer", "not found"), Check::skip("uid", "n/a")]);
        assert_eq!(
            report.verdict(false),
            Verdict::Blocked { failed: 1, warned: 0, strict: false }
        );
        assert_eq!(report.count(Status::Skip), 1);
    }

    #[test]
    fn test_counts_span_sections() {
        let mut report = report(vec![Check::pass("tar")]);
        report.add(Category::Inputs, vec![Check::pass("2022: template"), Check::warn("2022: config", "empty")]);
        assert_eq!(report.checks().count(), 3);
        assert_eq!(report.verdict(false), Verdict::ReadyWithWarnings(1));
        assert_eq!(report.verdict(true).to_string(), "blocked: 0 failed, 1 warning(s) (warnings are fatal with --strict)");
        assert_eq!(PreflightReport::new().verdict(true), Verdict::Ready);
    }
}
