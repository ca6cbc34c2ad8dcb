//! Result handle for a call whose result already exists in storage

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, debug_span, Instrument};

use crate::future::{
    error::FutureError,
    progress::{self, Resolution},
    remote::fetch_result,
};
use crate::invocation::InvocationCodec;
use crate::storage::StorageBackend;
use crate::task::TaskState;

/// Handle to a cached result
///
/// No task is involved: the result artifact is downloaded and decoded once in
/// the background. Cancellation is a no-op.
#[derive(Debug)]
pub struct CachedFuture<T> {
    result_url: String,
    resolution: Resolution<T>,
}

impl<T> CachedFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn spawn<S, C>(result_name: String, storage: Arc<S>, codec: Arc<C>) -> Self
    where
        S: StorageBackend,
        C: InvocationCodec<Output = T>,
    {
        let (publisher, resolution) = progress::channel(TaskState::Complete);
        let result_url = storage.generate_url(&result_name);

        let span = debug_span!("farcall_cached", result = %result_name);
        tokio::spawn(
            async move {
                let outcome = fetch_result(&*storage, &*codec, &result_name).await;
                debug!(ok = outcome.is_ok(), "Cached result resolved");
                publisher.resolve(TaskState::Complete, outcome);
            }
            .instrument(span),
        );

        Self {
            result_url,
            resolution,
        }
    }

    /// Wait for the deserialized cached result
    pub async fn result(&self, timeout: Option<Duration>) -> Result<T, FutureError> {
        self.resolution.wait(timeout).await
    }

    /// `true` while the local download is still in progress
    pub fn running(&self) -> bool {
        !self.resolution.is_resolved()
    }

    pub fn done(&self) -> bool {
        self.resolution.is_resolved()
    }

    /// Cached results cannot be cancelled; always `false`
    pub fn cancel(&self) -> bool {
        false
    }

    pub fn cancelled(&self) -> bool {
        false
    }

    pub fn result_url(&self) -> &str {
        &self.result_url
    }
}
