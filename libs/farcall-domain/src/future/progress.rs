//! Shared resolution cell between a result handle and its worker

use std::time::Duration;

use tokio::sync::watch;

use crate::future::error::FutureError;
use crate::task::TaskState;

/// What the worker has published so far
#[derive(Debug, Clone)]
pub(crate) struct Progress<T> {
    /// Last state observed for the remote task
    pub(crate) state: TaskState,
    /// Set exactly once, when the handle resolves
    pub(crate) outcome: Option<Result<T, FutureError>>,
}

impl<T> Progress<T> {
    pub(crate) fn pending(state: TaskState) -> Self {
        Self {
            state,
            outcome: None,
        }
    }
}

/// Worker side: publishes state changes and the final outcome
pub(crate) struct Publisher<T> {
    tx: watch::Sender<Progress<T>>,
}

impl<T> Publisher<T> {
    pub(crate) fn observe(&self, state: TaskState) {
        self.tx.send_modify(|progress| {
            if progress.outcome.is_none() {
                progress.state = state;
            }
        });
    }

    /// Publish the outcome; later calls are ignored
    pub(crate) fn resolve(&self, state: TaskState, outcome: Result<T, FutureError>) {
        self.tx.send_modify(|progress| {
            if progress.outcome.is_none() {
                progress.state = state;
                progress.outcome = Some(outcome);
            }
        });
    }
}

/// Handle side: reads progress and waits for the outcome
#[derive(Debug)]
pub(crate) struct Resolution<T> {
    rx: watch::Receiver<Progress<T>>,
}

pub(crate) fn channel<T>(initial: TaskState) -> (Publisher<T>, Resolution<T>) {
    let (tx, rx) = watch::channel(Progress::pending(initial));
    (Publisher { tx }, Resolution { rx })
}

impl<T: Clone> Resolution<T> {
    pub(crate) fn state(&self) -> TaskState {
        self.rx.borrow().state
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.rx.borrow().outcome.is_some()
    }

    pub(crate) fn peek(&self) -> Option<Result<T, FutureError>> {
        self.rx.borrow().outcome.clone()
    }

    /// Wait for the outcome, replaying it on every call
    pub(crate) async fn wait(&self, timeout: Option<Duration>) -> Result<T, FutureError> {
        let mut rx = self.rx.clone();
        let resolved = async move {
            match rx.wait_for(|progress| progress.outcome.is_some()).await {
                Ok(progress) => progress
                    .outcome
                    .clone()
                    .unwrap_or(Err(FutureError::WorkerLost)),
                Err(_) => Err(FutureError::WorkerLost),
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, resolved)
                .await
                .map_err(|_| FutureError::Timeout(limit))?,
            None => resolved.await,
        }
    }
}
