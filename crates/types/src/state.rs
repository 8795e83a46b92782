use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an exertion.
///
/// `Initial -> Running -> {Done, Failed, Error, Suspended}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecState {
    #[default]
    Initial,
    Running,
    Done,
    /// Recoverable failure; a caller may re-dispatch.
    Failed,
    /// Unrecoverable failure.
    Error,
    Suspended,
}

impl ExecState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecState::Done | ExecState::Failed | ExecState::Error | ExecState::Suspended)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExecState::Failed | ExecState::Error)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ExecState) -> bool {
        match (self, next) {
            (ExecState::Initial, ExecState::Running) => true,
            (ExecState::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Combines the states of two sibling failures, keeping the most severe.
    pub fn worst(self, other: ExecState) -> ExecState {
        match (self, other) {
            (ExecState::Error, _) | (_, ExecState::Error) => ExecState::Error,
            (ExecState::Failed, _) | (_, ExecState::Failed) => ExecState::Failed,
            (left, _) => left,
        }
    }
}

impl fmt::Display for ExecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecState::Initial => "initial",
            ExecState::Running => "running",
            ExecState::Done => "done",
            ExecState::Failed => "failed",
            ExecState::Error => "error",
            ExecState::Suspended => "suspended",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_not_reentered() {
        assert!(ExecState::Initial.can_transition_to(ExecState::Running));
        assert!(ExecState::Running.can_transition_to(ExecState::Done));
        assert!(!ExecState::Done.can_transition_to(ExecState::Running));
        assert!(!ExecState::Initial.can_transition_to(ExecState::Done));
    }

    #[test]
    fn worst_prefers_error_over_failed() {
        assert_eq!(ExecState::Failed.worst(ExecState::Error), ExecState::Error);
        assert_eq!(ExecState::Done.worst(ExecState::Failed), ExecState::Failed);
    }
}
