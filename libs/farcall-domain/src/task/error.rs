//! Errors reported by task backend adapters

use thiserror::Error;

use crate::task::ids::TaskId;

/// Failures talking to the execution backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskBackendError {
    /// A network blip or overloaded backend; the call may be retried
    #[error("Transient task backend failure: {0}")]
    Transient(String),

    /// The backend refused the request
    #[error("Task backend rejected the request: {0}")]
    Rejected(String),

    /// The backend does not know the task
    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    /// The backend answered with something we could not interpret
    #[error("Invalid task backend response: {0}")]
    InvalidResponse(String),
}

impl TaskBackendError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
