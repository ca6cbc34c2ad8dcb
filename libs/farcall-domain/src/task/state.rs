//! Remote task lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a task as reported by the execution backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// The backend has not reported a state yet, or reported one we do not know
    Unknown,
    Queued,
    Initializing,
    Running,
    Complete,
    /// The task's own command failed
    #[serde(alias = "EXECUTOR_ERROR")]
    Error,
    /// The backend failed to run the task
    SystemError,
    Canceled,
}

impl TaskState {
    /// No further transitions will happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Complete | TaskState::Error | TaskState::SystemError | TaskState::Canceled
        )
    }

    /// Accepted by the backend and not finished
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskState::Queued | TaskState::Initializing | TaskState::Running
        )
    }

    /// Terminal, and not a success
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && *self != TaskState::Complete
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Unknown => "UNKNOWN",
            TaskState::Queued => "QUEUED",
            TaskState::Initializing => "INITIALIZING",
            TaskState::Running => "RUNNING",
            TaskState::Complete => "COMPLETE",
            TaskState::Error => "ERROR",
            TaskState::SystemError => "SYSTEM_ERROR",
            TaskState::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
