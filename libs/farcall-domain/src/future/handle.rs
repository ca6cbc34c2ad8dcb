use std::time::Duration;

use crate::future::{cached::CachedFuture, error::FutureError, remote::RemoteFuture};
use crate::task::{TaskId, TaskState};

/// What `InvocationBuilder::run` returns
///
/// `Remote` when a task computes (or is already computing) the result,
/// `Cached` when the result was found in storage.
#[derive(Debug)]
pub enum ResultHandle<T> {
    Remote(RemoteFuture<T>),
    Cached(CachedFuture<T>),
}

impl<T> ResultHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wait for the result; see [`RemoteFuture::result`]
    pub async fn result(&self, timeout: Option<Duration>) -> Result<T, FutureError> {
        match self {
            ResultHandle::Remote(future) => future.result(timeout).await,
            ResultHandle::Cached(future) => future.result(timeout).await,
        }
    }

    pub fn running(&self) -> bool {
        match self {
            ResultHandle::Remote(future) => future.running(),
            ResultHandle::Cached(future) => future.running(),
        }
    }

    pub fn done(&self) -> bool {
        match self {
            ResultHandle::Remote(future) => future.done(),
            ResultHandle::Cached(future) => future.done(),
        }
    }

    pub fn cancel(&self) -> bool {
        match self {
            ResultHandle::Remote(future) => future.cancel(),
            ResultHandle::Cached(future) => future.cancel(),
        }
    }

    pub fn cancelled(&self) -> bool {
        match self {
            ResultHandle::Remote(future) => future.cancelled(),
            ResultHandle::Cached(future) => future.cancelled(),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, ResultHandle::Cached(_))
    }

    /// Backend task id, `None` for cached results
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            ResultHandle::Remote(future) => Some(future.task_id()),
            ResultHandle::Cached(_) => None,
        }
    }

    /// Last known task state (`COMPLETE` for cached results)
    pub fn status(&self) -> TaskState {
        match self {
            ResultHandle::Remote(future) => future.status(),
            ResultHandle::Cached(_) => TaskState::Complete,
        }
    }

    pub fn result_url(&self) -> &str {
        match self {
            ResultHandle::Remote(future) => future.result_url(),
            ResultHandle::Cached(future) => future.result_url(),
        }
    }
}
