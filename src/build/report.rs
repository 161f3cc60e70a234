//! Result of one build invocation.

use std::path::PathBuf;

use super::rebuild::RebuildDecision;
use super::state::{BuildState, Transition};
use crate::error::{BuildError, CleanupWarning};
use crate::media::MediaStrategy;

#[derive(Debug)]
pub enum Outcome {
    /// A new box was built and registered.
    Succeeded,
    /// The existing box is fresh; nothing ran.
    Skipped,
    Failed(BuildError),
}

#[derive(Debug)]
pub struct BuildReport {
    pub version: String,
    pub outcome: Outcome,
    pub transitions: Vec<Transition>,
    pub decision: Option<RebuildDecision>,
    /// Strategy of the last media attempt.
    pub strategy: Option<MediaStrategy>,
    /// Incremental patch failed and full synthesis was used instead.
    pub fell_back: bool,
    pub warnings: Vec<CleanupWarning>,
    pub box_path: Option<PathBuf>,
    pub record_path: Option<PathBuf>,
}

impl BuildReport {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            outcome: Outcome::Failed(BuildError::Validation("build did not run".to_string())),
            transitions: Vec::new(),
            decision: None,
            strategy: None,
            fell_back: false,
            warnings: Vec::new(),
            box_path: None,
            record_path: None,
        }
    }

    /// True for both a fresh build and a skip.
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed(_))
    }

    pub fn error(&self) -> Option<&BuildError> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn final_state(&self) -> BuildState {
        self.transitions
            .last()
            .map(|t| t.to)
            .unwrap_or(BuildState::Idle)
    }

    /// States visited, in order, starting with `Idle`.
    pub fn states(&self) -> Vec<BuildState> {
        let mut states = vec![BuildState::Idle];
        states.extend(self.transitions.iter().map(|t| t.to));
        states
    }

    pub fn print(&self) {
        println!();
        match &self.outcome {
            Outcome::Succeeded => println!("=== Build {} succeeded ===", self.version),
            Outcome::Skipped => println!("=== Build {} skipped ===", self.version),
            Outcome::Failed(e) => println!("=== Build {} FAILED ({}) ===", self.version, e.kind()),
        }
        if let Some(decision) = &self.decision {
            println!("  Decision: {}", decision);
        }
        if let Some(strategy) = self.strategy {
            if self.fell_back {
                println!("  Media:    {} (after incremental patch failed)", strategy);
            } else {
                println!("  Media:    {}", strategy);
            }
        }
        if let Some(path) = &self.box_path {
            println!("  Box:      {}", path.display());
        }
        if let Some(path) = &self.record_path {
            println!("  Record:   {}", path.display());
        }
        let path: Vec<String> = self.states().iter().map(|s| s.to_string()).collect();
        println!("  States:   {}", path.join(" -> "));
        for warning in &self.warnings {
            println!("  [WARN] {}", warning.message);
        }
        if let Outcome::Failed(e) = &self.outcome {
            println!();
            println!("{}", e);
        }
    }
}
