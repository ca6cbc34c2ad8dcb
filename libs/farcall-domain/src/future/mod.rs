//! Result handles
//!
//! A handle is returned as soon as a call is staged. It resolves in the
//! background, either by polling a remote task or by reading a cached result,
//! and replays the same outcome to every caller.

pub mod cached;
pub mod error;
pub mod handle;
mod progress;
pub mod remote;

pub use cached::CachedFuture;
pub use error::FutureError;
pub use handle::ResultHandle;
pub use remote::RemoteFuture;
