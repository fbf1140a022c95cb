//! Run state machine.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Validating,
    ValidationBlocked,
    ValidationWarned,
    ValidationClean,
    Running,
    Succeeded,
    Failed,
}

impl RunState {
    /// Whether `self -> next` is a legal transition.
    ///
    /// `Validating -> Idle` is the `validate_diagram` shortcut.
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, ValidationBlocked | ValidationWarned | ValidationClean | Idle)
                | (ValidationBlocked, Idle)
                | (ValidationWarned | ValidationClean, Running)
                | (Running, Succeeded | Failed)
                | (Succeeded | Failed, Idle)
        )
    }

    pub fn is_idle(self) -> bool {
        self == RunState::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Validating => "validating",
            RunState::ValidationBlocked => "validation_blocked",
            RunState::ValidationWarned => "validation_warned",
            RunState::ValidationClean => "validation_clean",
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
