//! Running the external build engine.

use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::error::{BuildError, BuildResult};
use crate::timing::Timer;
use crate::tools::{BuildEngine, EngineJob};

/// Lines of engine log carried in a failure.
pub const LOG_TAIL_LINES: usize = 20;

/// Run `engine` on `job`. Any non-zero exit is a build engine error
/// carrying the tail of the engine log. No retry.
pub fn run(engine: &dyn BuildEngine, job: &EngineJob<'_>) -> BuildResult<()> {
    if let Some(dir) = job.log_path.parent() {
        fs::create_dir_all(dir).map_err(|e| {
            BuildError::Validation(format!("cannot create log directory {}: {}", dir.display(), e))
        })?;
    }
    if let Some(parent) = job.output_dir.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BuildError::Validation(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }

    info!(
        image = %job.image.display(),
        output = %job.output_dir.display(),
        network = %job.network,
        "starting build engine"
    );
    let timer = Timer::start("Building");
    let code = match engine.build(job) {
        Ok(code) => code,
        Err(e) => {
            return Err(BuildError::BuildEngine {
                code: -1,
                log_tail: format!("{:#}", e),
            })
        }
    };
    timer.finish();

    if code != 0 {
        let log_tail = tail_lines(job.log_path, LOG_TAIL_LINES);
        error!(code, "build engine failed; log: {}", job.log_path.display());
        return Err(BuildError::BuildEngine { code, log_tail });
    }
    Ok(())
}

/// Last `n` lines of the file at `path`, or a note if it cannot be read.
pub fn tail_lines(path: &Path, n: usize) -> String {
    match fs::read(path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let lines: Vec<&str> = text.lines().collect();
            let start = lines.len().saturating_sub(n);
            lines[start..].join("\n")
        }
        Err(e) => format!("(engine log {} unavailable: {})", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tail_lines() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("engine.log");
        let content: String = (1..=30).map(|i| format!("line {}\n", i)).collect();
        fs::write(&log, content).unwrap();

        let tail = tail_lines(&log, 20);
        assert_eq!(tail.lines().count(), 20);
        assert!(tail.starts_with("line 11"));
        assert!(tail.ends_with("line 30"));
    }

    #[test]
    fn test_tail_short_file() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("engine.log");
        fs::write(&log, "only\n").unwrap();
        assert_eq!(tail_lines(&log, 20), "only");
    }

    #[test]
    fn test_tail_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert!(tail_lines(&tmp.path().join("nope.log"), 20).contains("unavailable"));
    }
}
