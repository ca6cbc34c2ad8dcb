//! Task backend port
//!
//! The execution backend is an external collaborator: it accepts a task
//! description, runs it somewhere, and reports its state.

use std::future::Future;

use crate::task::{
    entity::TaskDescription, error::TaskBackendError, ids::TaskId, state::TaskState,
};

/// Port for a remote task execution service
pub trait TaskBackend: Send + Sync + 'static {
    /// Submit a task and return the id the backend assigned to it
    fn submit(
        &self,
        task: &TaskDescription,
    ) -> impl Future<Output = Result<TaskId, TaskBackendError>> + Send;

    /// Current state of a task
    fn poll_status(
        &self,
        id: &TaskId,
    ) -> impl Future<Output = Result<TaskState, TaskBackendError>> + Send;

    /// Ask the backend to cancel a task
    ///
    /// Cancellation is asynchronous on the backend side: later polls observe
    /// `TaskState::Canceled` once it has taken effect.
    fn cancel(&self, id: &TaskId) -> impl Future<Output = Result<(), TaskBackendError>> + Send;

    /// Full diagnostic view of a task, used to enrich failure reports
    fn get_full(&self, id: &TaskId)
        -> impl Future<Output = Result<String, TaskBackendError>> + Send;
}
