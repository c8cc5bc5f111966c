//! Step state machine.

use serde::{Deserialize, Serialize};

/// The state of one step invocation within an execution.
///
/// State transitions:
/// ```text
/// Pending ──► Running ──┬──► Succeeded ──► Compensating ──┬──► Compensated
///    │                  │                                 └──► CompensationFailed
///    │                  └──► Failed
///    └──► Skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StepState {
    /// Waiting for dependencies.
    #[default]
    Pending,

    /// The body is executing.
    Running,

    /// The body returned successfully.
    Succeeded,

    /// The activation predicate was false or no input was bound.
    Skipped,

    /// The body failed on its last attempt.
    Failed,

    /// The compensation is executing.
    Compensating,

    /// The compensation returned successfully.
    Compensated,

    /// The compensation failed.
    CompensationFailed,
}

impl StepState {
    /// Returns true if the step can begin compensation.
    pub fn can_compensate(&self) -> bool {
        matches!(self, StepState::Succeeded)
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Skipped)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Succeeded, Compensating)
                | (Compensating, Compensated)
                | (Compensating, CompensationFailed)
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepState::Pending => "Pending",
            StepState::Running => "Running",
            StepState::Succeeded => "Succeeded",
            StepState::Skipped => "Skipped",
            StepState::Failed => "Failed",
            StepState::Compensating => "Compensating",
            StepState::Compensated => "Compensated",
            StepState::CompensationFailed => "CompensationFailed",
        }
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
