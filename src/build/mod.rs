//! Build orchestration.
//!
//! # Modules
//!
//! - `context`: BuildContext threaded through every stage
//! - `state`: the explicit state machine and its transition table
//! - `rebuild`: box age versus rebuild interval
//! - `lease`: advisory lease on the output directory
//! - `engine`: running the external build engine
//! - `artifact`: verifying the engine's disk output
//! - `cleanup`: unconditional end-of-attempt cleanup
//! - `orchestrator`: ties the stages together
//! - `report`: what a build returns

pub mod artifact;
pub mod cleanup;
pub mod context;
pub mod engine;
pub mod lease;
pub mod orchestrator;
pub mod rebuild;
pub mod report;
pub mod state;

pub use artifact::BuildArtifact;
pub use context::BuildContext;
pub use orchestrator::Orchestrator;
pub use rebuild::RebuildDecision;
pub use report::{BuildReport, Outcome};
pub use state::{BuildState, Event};
