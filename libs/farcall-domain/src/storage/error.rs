//! Domain errors for storage operations
//!
//! These errors abstract away the concrete backend (filesystem, S3 SDK, ...).
//! Adapters convert their infrastructure failures into one of these variants.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::storage::Scheme;

/// Errors that can occur while talking to a storage backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The storage URL is malformed or uses an unsupported scheme
    #[error("Invalid storage location '{url}': {reason}")]
    InvalidLocation { url: String, reason: String },

    /// No credentials were supplied and none could be discovered
    #[error("{scheme} credentials could not be resolved: {reason}")]
    CredentialsUnavailable { scheme: Scheme, reason: String },

    /// The target artifact exists and overwriting was not permitted
    #[error("Artifact '{0}' already exists and overwrite_existing is false")]
    ArtifactExists(String),

    /// The download destination exists and overwriting was not permitted
    #[error("Destination '{}' already exists and overwrite_existing is false", .0.display())]
    DestinationExists(PathBuf),

    /// The requested artifact does not exist
    #[error("Artifact '{0}' not found")]
    ArtifactNotFound(String),

    /// Conflicting or missing upload parameters
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The backend failed for an infrastructure reason
    #[error("Storage operation failed: {0}")]
    BackendFailure(String),
}

impl StorageError {
    /// Create an invalid location error
    pub fn invalid_location(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLocation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a credentials error for the given scheme
    pub fn credentials_unavailable(scheme: Scheme, reason: impl Into<String>) -> Self {
        Self::CredentialsUnavailable {
            scheme,
            reason: reason.into(),
        }
    }

    /// Create an invalid arguments error
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a backend failure error
    pub fn backend_failure(msg: impl Into<String>) -> Self {
        Self::BackendFailure(msg.into())
    }

    /// Wrap an I/O error raised while touching `path`
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::BackendFailure(format!("I/O error on '{}': {}", path.display(), err))
    }
}

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_exists_message() {
        let err = StorageError::ArtifactExists("run/a.txt".to_string());
        assert!(err.to_string().contains("run/a.txt"));
        assert!(err.to_string().contains("overwrite_existing"));
    }

    #[test]
    fn test_credentials_unavailable_names_scheme() {
        let err = StorageError::credentials_unavailable(Scheme::S3, "no key");
        assert_eq!(err.to_string(), "s3 credentials could not be resolved: no key");
    }

    #[test]
    fn test_destination_exists_displays_path() {
        let err = StorageError::DestinationExists(PathBuf::from("/tmp/out.bin"));
        assert!(err.to_string().contains("/tmp/out.bin"));
    }
}
