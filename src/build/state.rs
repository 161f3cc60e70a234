//! Build state machine.
//!
//! The orchestrator never assigns a state directly. It feeds an [`Event`]
//! to [`BuildState::next`], which either returns the successor or rejects
//! the pair. Every accepted transition ends up in the build report.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildState {
    Idle,
    DecidingRebuild,
    PreparingMedia,
    Building,
    VerifyingArtifact,
    Packaging,
    PersistingCredentials,
    CleaningUp,
    Succeeded,
    Failed,
}

/// What just happened in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The current stage completed.
    Advance,
    /// The existing box is fresh; nothing to do.
    UpToDate,
    /// The current stage failed fatally.
    Fault,
    /// Cleanup finished and no fatal error is pending.
    Done,
    /// Cleanup finished with a fatal error pending.
    DoneWithError,
}

impl BuildState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Succeeded | BuildState::Failed)
    }

    /// States that run an external stage and can therefore fault.
    fn can_fault(self) -> bool {
        matches!(
            self,
            BuildState::DecidingRebuild
                | BuildState::PreparingMedia
                | BuildState::Building
                | BuildState::VerifyingArtifact
                | BuildState::Packaging
        )
    }

    /// Successor of `self` on `event`, or `None` if the pair is not allowed.
    pub fn next(self, event: Event) -> Option<BuildState> {
        use BuildState::*;
        use Event::*;

        match (self, event) {
            (Idle, Advance) => Some(DecidingRebuild),
            (DecidingRebuild, UpToDate) => Some(Succeeded),
            (DecidingRebuild, Advance) => Some(PreparingMedia),
            (PreparingMedia, Advance) => Some(Building),
            (Building, Advance) => Some(VerifyingArtifact),
            (VerifyingArtifact, Advance) => Some(Packaging),
            (Packaging, Advance) => Some(PersistingCredentials),
            // A failed record write is a warning, not a fault.
            (PersistingCredentials, Advance) => Some(CleaningUp),
            (state, Fault) if state.can_fault() => Some(CleaningUp),
            (CleaningUp, Done) => Some(Succeeded),
            (CleaningUp, DoneWithError) => Some(Failed),
            _ => None,
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Idle => "Idle",
            BuildState::DecidingRebuild => "DecidingRebuild",
            BuildState::PreparingMedia => "PreparingMedia",
            BuildState::Building => "Building",
            BuildState::VerifyingArtifact => "VerifyingArtifact",
            BuildState::Packaging => "Packaging",
            BuildState::PersistingCredentials => "PersistingCredentials",
            BuildState::CleaningUp => "CleaningUp",
            BuildState::Succeeded => "Succeeded",
            BuildState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// One accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: BuildState,
    pub to: BuildState,
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;
    use BuildState::*;

    fn walk(events: &[Event]) -> Vec<BuildState> {
        let mut state = Idle;
        let mut seen = vec![state];
        for &event in events {
            state = state.next(event).unwrap();
            seen.push(state);
        }
        seen
    }

    #[test]
    fn test_happy_path() {
        let mut events = vec![Event::Advance; 7];
        events.push(Event::Done);
        assert_eq!(
            walk(&events),
            vec![
                Idle,
                DecidingRebuild,
                PreparingMedia,
                Building,
                VerifyingArtifact,
                Packaging,
                PersistingCredentials,
                CleaningUp,
                Succeeded
            ]
        );
    }

    #[test]
    fn test_up_to_date_skips_cleanup() {
        assert_eq!(
            walk(&[Event::Advance, Event::UpToDate]),
            vec![Idle, DecidingRebuild, Succeeded]
        );
    }

    #[test]
    fn test_every_fault_goes_through_cleanup() {
        for state in [DecidingRebuild, PreparingMedia, Building, VerifyingArtifact, Packaging] {
            assert_eq!(state.next(Event::Fault), Some(CleaningUp), "{}", state);
        }
        assert_eq!(CleaningUp.next(Event::DoneWithError), Some(Failed));
    }

    #[test]
    fn test_rejected_transitions() {
        assert_eq!(Idle.next(Event::Fault), None);
        assert_eq!(PreparingMedia.next(Event::UpToDate), None);
        assert_eq!(PersistingCredentials.next(Event::Fault), None);
        assert_eq!(CleaningUp.next(Event::Advance), None);
        assert_eq!(Succeeded.next(Event::Advance), None);
        assert_eq!(Failed.next(Event::Done), None);
    }

    #[test]
    fn test_terminal() {
        assert!(Succeeded.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!CleaningUp.is_terminal());
    }
}
