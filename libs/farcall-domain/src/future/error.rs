//! Errors surfaced by result handles

use std::time::Duration;

use thiserror::Error;

use crate::invocation::CodecError;
use crate::storage::StorageError;
use crate::task::{TaskBackendError, TaskId, TaskState};

/// Why a result handle did not produce a value
///
/// Task-level failures (`RemoteTaskFailed`) are kept apart from failures to
/// read or decode the result of a task that did complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FutureError {
    /// The task reached a terminal state other than `COMPLETE`
    #[error("Remote task {task_id} failed with state {state}:\n{detail}")]
    RemoteTaskFailed {
        task_id: TaskId,
        state: TaskState,
        detail: String,
    },

    /// The result artifact could not be read from storage
    #[error("Result artifact could not be read: {0}")]
    ResultUnavailable(StorageError),

    /// The result artifact was read but could not be deserialized
    #[error("Result could not be decoded: {0}")]
    ResultDecode(CodecError),

    /// Polling the backend failed for good
    #[error("Task backend failed while waiting for task {task_id}: {source}")]
    Backend {
        task_id: TaskId,
        source: TaskBackendError,
    },

    /// The caller cancelled the handle before it resolved
    #[error("Task {0} was cancelled")]
    Cancelled(TaskId),

    /// `result` gave up waiting; the handle keeps resolving in the background
    #[error("Timed out after {0:?} waiting for the result")]
    Timeout(Duration),

    /// The background worker stopped without publishing an outcome
    #[error("Result worker stopped before the result was resolved")]
    WorkerLost,
}

impl FutureError {
    /// Whether this error reflects a cancelled task
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            FutureError::Cancelled(_)
                | FutureError::RemoteTaskFailed {
                    state: TaskState::Canceled,
                    ..
                }
        )
    }
}
