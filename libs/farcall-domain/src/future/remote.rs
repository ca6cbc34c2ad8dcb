//! Result handle for a submitted task
//!
//! A background worker polls the task backend with exponential backoff until
//! the task reaches a terminal state, then downloads and decodes the result.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::future::{
    error::FutureError,
    progress::{self, Publisher, Resolution},
};
use crate::invocation::InvocationCodec;
use crate::offload::PollConfig;
use crate::storage::StorageBackend;
use crate::task::{TaskBackend, TaskId, TaskState};

/// Handle to the result of a remote task
///
/// States: `SUBMITTED → RUNNING → {COMPLETE, ERROR, CANCELED}`. Construction
/// returns immediately; all waiting happens in a spawned tokio task.
#[derive(Debug)]
pub struct RemoteFuture<T> {
    task_id: TaskId,
    result_url: String,
    submitted_at: DateTime<Utc>,
    resolution: Resolution<T>,
    cancel_tx: watch::Sender<bool>,
}

/// Everything the poll worker needs, owned
pub(crate) struct RemoteTarget<S, B, C> {
    pub(crate) task_id: TaskId,
    pub(crate) result_name: String,
    pub(crate) storage: Arc<S>,
    pub(crate) backend: Arc<B>,
    pub(crate) codec: Arc<C>,
    pub(crate) poll: PollConfig,
}

impl<T> RemoteFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start resolving a submitted task in the background
    pub(crate) fn spawn<S, B, C>(target: RemoteTarget<S, B, C>) -> Self
    where
        S: StorageBackend,
        B: TaskBackend,
        C: InvocationCodec<Output = T>,
    {
        let (publisher, resolution) = progress::channel(TaskState::Unknown);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task_id = target.task_id.clone();
        let result_url = target.storage.generate_url(&target.result_name);

        let span = info_span!("farcall_task", task_id = %task_id);
        tokio::spawn(drive(target, publisher, cancel_rx).instrument(span));

        Self {
            task_id,
            result_url,
            submitted_at: Utc::now(),
            resolution,
            cancel_tx,
        }
    }

    /// Wait for the deserialized result
    ///
    /// Calling this again returns the same value or error without polling or
    /// downloading again. With a `timeout`, returns `FutureError::Timeout`
    /// once it elapses and leaves the handle untouched.
    pub async fn result(&self, timeout: Option<Duration>) -> Result<T, FutureError> {
        self.resolution.wait(timeout).await
    }

    /// `true` until the handle resolves
    pub fn running(&self) -> bool {
        !self.resolution.is_resolved()
    }

    pub fn done(&self) -> bool {
        self.resolution.is_resolved()
    }

    /// Request cancellation of the local poll and the remote task
    ///
    /// Returns `false` once the handle resolved or the task was seen in a
    /// terminal state. Repeated calls are harmless.
    pub fn cancel(&self) -> bool {
        if self.resolution.is_resolved() || self.resolution.state().is_terminal() {
            return false;
        }
        self.cancel_tx.send_replace(true);
        true
    }

    /// Whether the handle resolved as cancelled
    pub fn cancelled(&self) -> bool {
        matches!(self.resolution.peek(), Some(Err(err)) if err.is_cancellation())
    }

    /// Last task state observed by the worker
    pub fn status(&self) -> TaskState {
        self.resolution.state()
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// URL of the result artifact
    pub fn result_url(&self) -> &str {
        &self.result_url
    }

    pub fn submitted_at(&self) -> &DateTime<Utc> {
        &self.submitted_at
    }
}

enum Signal {
    Cancel,
    HandleDropped,
}

async fn next_signal(cancel_rx: &mut watch::Receiver<bool>) -> Signal {
    match cancel_rx.wait_for(|requested| *requested).await {
        Ok(_) => Signal::Cancel,
        Err(_) => Signal::HandleDropped,
    }
}

async fn drive<S, B, C>(
    target: RemoteTarget<S, B, C>,
    publisher: Publisher<C::Output>,
    mut cancel_rx: watch::Receiver<bool>,
) where
    S: StorageBackend,
    B: TaskBackend,
    C: InvocationCodec,
{
    let mut interval = target.poll.initial_interval;
    let mut transient_failures = 0u32;
    let mut last_state = TaskState::Unknown;

    let final_state = loop {
        let polled = tokio::select! {
            biased;
            signal = next_signal(&mut cancel_rx) => {
                stop(&target, &publisher, signal).await;
                return;
            }
            polled = target.backend.poll_status(&target.task_id) => polled,
        };

        match polled {
            Ok(state) => {
                transient_failures = 0;
                last_state = state;
                publisher.observe(state);
                if state.is_terminal() {
                    break state;
                }
                debug!(state = %state, "Task still active");
            }
            Err(err) if err.is_transient() && transient_failures < target.poll.max_transient_failures => {
                transient_failures += 1;
                warn!(error = %err, attempt = transient_failures, "Transient failure polling task, retrying");
            }
            Err(err) => {
                warn!(error = %err, "Giving up polling task");
                publisher.resolve(
                    last_state,
                    Err(FutureError::Backend {
                        task_id: target.task_id.clone(),
                        source: err,
                    }),
                );
                return;
            }
        }

        tokio::select! {
            biased;
            signal = next_signal(&mut cancel_rx) => {
                stop(&target, &publisher, signal).await;
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
        interval = target.poll.next_interval(interval);
    };

    if final_state != TaskState::Complete {
        let detail = match target.backend.get_full(&target.task_id).await {
            Ok(detail) => detail,
            Err(err) => format!("<task details unavailable: {}>", err),
        };
        warn!(state = %final_state, "Remote task failed");
        publisher.resolve(
            final_state,
            Err(FutureError::RemoteTaskFailed {
                task_id: target.task_id.clone(),
                state: final_state,
                detail,
            }),
        );
        return;
    }

    info!(result = %target.result_name, "Remote task complete, fetching result");
    let outcome = fetch_result(&*target.storage, &*target.codec, &target.result_name).await;
    publisher.resolve(TaskState::Complete, outcome);
}

async fn stop<S, B, C>(target: &RemoteTarget<S, B, C>, publisher: &Publisher<C::Output>, signal: Signal)
where
    S: StorageBackend,
    B: TaskBackend,
    C: InvocationCodec,
{
    match signal {
        Signal::HandleDropped => {
            debug!("Result handle dropped, stopping poll");
        }
        Signal::Cancel => {
            request_remote_cancel(target).await;
            publisher.resolve(
                TaskState::Canceled,
                Err(FutureError::Cancelled(target.task_id.clone())),
            );
        }
    }
}

async fn request_remote_cancel<S, B, C>(target: &RemoteTarget<S, B, C>)
where
    B: TaskBackend,
{
    let mut interval = target.poll.initial_interval;
    let mut attempts = 0u32;
    loop {
        match target.backend.cancel(&target.task_id).await {
            Ok(()) => {
                info!("Remote task cancellation acknowledged");
                return;
            }
            Err(err) if err.is_transient() && attempts < target.poll.max_transient_failures => {
                attempts += 1;
                warn!(error = %err, attempt = attempts, "Transient failure cancelling task, retrying");
                tokio::time::sleep(interval).await;
                interval = target.poll.next_interval(interval);
            }
            Err(err) => {
                warn!(error = %err, "Remote task cancellation failed");
                return;
            }
        }
    }
}

/// Read and decode a result artifact
pub(crate) async fn fetch_result<S, C>(
    storage: &S,
    codec: &C,
    result_name: &str,
) -> Result<C::Output, FutureError>
where
    S: StorageBackend,
    C: InvocationCodec,
{
    let bytes = storage
        .fetch(result_name)
        .await
        .map_err(FutureError::ResultUnavailable)?;
    codec.decode(&bytes).map_err(FutureError::ResultDecode)
}
