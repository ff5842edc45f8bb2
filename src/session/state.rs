//! Session lifecycle states

use std::fmt;

use crate::{Error, Result};

/// Lifecycle of an automation session
///
/// `Idle -> Opening -> Open -> Closing -> Closed`, with `Opening`, `Open`
/// and `Closing` able to end in `Failed`. `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Open,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Opening)
                | (Opening, Open)
                | (Opening, Failed)
                | (Open, Closing)
                | (Open, Failed)
                | (Closing, Closed)
                | (Closing, Failed)
        )
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(self, next: SessionState) -> Result<SessionState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::internal(format!(
                "Invalid session transition {} -> {}",
                self, next
            )))
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Opening => "opening",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = Idle
            .transition(Opening)
            .and_then(|s| s.transition(Open))
            .and_then(|s| s.transition(Closing))
            .and_then(|s| s.transition(Closed))
            .unwrap();
        assert_eq!(state, Closed);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failure_edges() {
        assert!(Opening.can_transition_to(Failed));
        assert!(Open.can_transition_to(Failed));
        assert!(Closing.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Failed));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [Closed, Failed] {
            for next in [Idle, Opening, Open, Closing, Closed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_invalid_transition() {
        assert!(matches!(Idle.transition(Open), Err(Error::Internal(_))));
        assert!(Open.transition(Opening).is_err());
    }
}
