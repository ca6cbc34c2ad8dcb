//! Errors raised while configuring and submitting a remote call
//!
//! Registration errors (`UnsupportedScheme`, `LocalStoreMismatch`,
//! `InvalidPath`, `InvalidRunId`) are raised synchronously when a file or
//! cache name is registered, never deferred to submission time.

use thiserror::Error;

use crate::invocation::CodecError;
use crate::storage::StorageError;
use crate::task::TaskBackendError;

/// Errors from `InvocationBuilder` operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OffloadError {
    /// The input URL uses a scheme the file store cannot serve
    #[error("Unsupported scheme in '{url}' - must be one of {supported}")]
    UnsupportedScheme { url: String, supported: String },

    /// A local file was registered as input while the file store is remote
    #[error("Input '{0}' is a local file but the file store is not local; upload it to the file store first")]
    LocalStoreMismatch(String),

    /// A runtime path is neither absolute nor relative to the working directory
    #[error("Invalid runtime path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A cache name cannot be used as a run namespace
    #[error("Invalid run identifier '{name}': {reason}")]
    InvalidRunId { name: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    TaskBackend(#[from] TaskBackendError),
}

impl OffloadError {
    pub fn unsupported_scheme(url: impl Into<String>, supported: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            url: url.into(),
            supported: supported.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_run_id(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRunId {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for offload operations
pub type Result<T> = std::result::Result<T, OffloadError>;
