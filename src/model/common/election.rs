use std::fmt::{self, Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Phases of the election lifecycle.
///
/// The legal edges are `Draft -> Scheduled -> Active <-> Paused -> Ended`,
/// with `Ended` reachable from both `Active` and `Paused`. `Ended` is
/// terminal: once entered, no further phase transition is legal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionPhase {
    /// Under construction, not yet scheduled.
    Draft,
    /// Waiting for its voting window; editable until activated.
    Scheduled,
    /// Open for ballots.
    Active,
    /// Temporarily closed for ballots; can reopen or end.
    Paused,
    /// Closed forever. Only `results_published` may still change.
    Ended,
}

impl ElectionPhase {
    /// Is `self -> target` one of the legal lifecycle edges?
    pub fn can_transition_to(self, target: ElectionPhase) -> bool {
        use ElectionPhase::*;
        matches!(
            (self, target),
            (Draft, Scheduled)
                | (Scheduled, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Ended)
                | (Paused, Ended)
        )
    }

    /// Has this election finished for good?
    pub fn is_terminal(self) -> bool {
        self == ElectionPhase::Ended
    }
}

impl From<ElectionPhase> for Bson {
    fn from(phase: ElectionPhase) -> Self {
        to_bson(&phase).expect("Serialisation is infallible")
    }
}

impl Display for ElectionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::ElectionPhase::*;

    const ALL: [super::ElectionPhase; 5] = [Draft, Scheduled, Active, Paused, Ended];

    #[test]
    fn legal_edges() {
        assert!(Draft.can_transition_to(Scheduled));
        assert!(Scheduled.can_transition_to(Active));
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Active.can_transition_to(Ended));
        assert!(Paused.can_transition_to(Ended));
    }

    #[test]
    fn ended_is_terminal() {
        for target in ALL {
            assert!(!Ended.can_transition_to(target));
        }
    }

    #[test]
    fn no_self_loops_or_skips() {
        for phase in ALL {
            assert!(!phase.can_transition_to(phase));
        }
        // Cannot skip the schedule or jump straight to the end.
        assert!(!Draft.can_transition_to(Active));
        assert!(!Scheduled.can_transition_to(Ended));
        assert!(!Scheduled.can_transition_to(Paused));
    }
}
