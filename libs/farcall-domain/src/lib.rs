//! # Farcall Domain Layer
//!
//! Client-side orchestration for offloading a function call to a remote
//! execution backend. It follows hexagonal architecture principles:
//!
//! - **Storage**: the `StorageBackend` port and the location model shared by
//!   local and object-store adapters
//! - **Invocation**: what gets executed, its codec, and its cache key
//! - **Task**: the description handed to the execution backend and the
//!   `TaskBackend` port
//! - **Offload**: `InvocationBuilder`, run namespaces and task submission
//! - **Future**: result handles resolving in the background
//! - **Entrypoint**: the in-container side that executes a staged invocation
//!
//! ## Architecture
//!
//! This layer has NO dependencies on infrastructure concerns (AWS, HTTP,
//! ...). Every external collaborator is a trait (port) implemented by an
//! adapter crate.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use farcall_domain::{Invocation, InvocationBuilder, JsonCodec};
//! use farcall_domain::ports::{StorageBackend, TaskBackend};
//!
//! async fn hello<S: StorageBackend, B: TaskBackend>(store: Arc<S>, backend: Arc<B>) {
//!     let mut builder = InvocationBuilder::new(store, backend);
//!     let invocation = Invocation::new("hello", vec!["world".into()]).unwrap();
//!     let handle = builder
//!         .run(Arc::new(JsonCodec::<String>::new()), &invocation)
//!         .await
//!         .unwrap();
//!     println!("{}", handle.result(None).await.unwrap());
//! }
//! ```

pub mod entrypoint;
pub mod future;
pub mod invocation;
pub mod offload;
pub mod storage;
pub mod task;

#[cfg(test)]
mod testing;

/// Every port adapters implement, in one place
pub mod ports {
    pub use crate::invocation::InvocationCodec;
    pub use crate::storage::StorageBackend;
    pub use crate::task::TaskBackend;
}

// Re-export commonly used types
pub use entrypoint::{EntrypointError, FunctionRegistry};
pub use future::{FutureError, ResultHandle};
pub use invocation::{CacheKey, Invocation, JsonCodec};
pub use offload::{ExecutorConfig, InvocationBuilder, OffloadError, PollConfig, ResourceRequest, RunId};
pub use storage::{EntryKind, Scheme, StorageError, StorageLocation, UploadRequest};
pub use task::{TaskDescription, TaskId, TaskState};
