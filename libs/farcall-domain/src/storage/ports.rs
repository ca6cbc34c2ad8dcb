//! Storage port
//!
//! This module defines the contract every storage adapter implements.
//! Following hexagonal architecture, the domain defines what it needs, and the
//! infrastructure provides implementations.
//!
//! ## Static Dispatch
//!
//! We use native Rust async traits with `impl Future` return types instead of
//! `async_trait` to ensure zero-cost abstractions and static dispatch.

use std::future::Future;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::storage::{
    error::StorageError,
    location::{Scheme, StorageLocation},
    upload::{EntryKind, UploadRequest},
};

/// Port for a bucket-like storage space
///
/// Implementations must:
/// - report "not found" as `Ok(false)` from `exists`, never as an error
/// - make single-artifact writes atomic (no partially written artifact is
///   ever visible to a reader)
/// - honour the `overwrite_existing` guards of `upload` and `download`
///
/// URL generation is provided by the trait and never touches the backend,
/// so the location of an artifact can be embedded in a task description
/// before anything creates it.
pub trait StorageBackend: Send + Sync + 'static {
    /// Root location this backend writes under
    fn location(&self) -> &StorageLocation;

    fn scheme(&self) -> Scheme {
        self.location().scheme()
    }

    /// Schemes this backend accepts as task input sources
    fn supported_schemes(&self) -> &'static [Scheme] {
        &Scheme::ALL
    }

    /// Deterministic URL for an artifact name
    fn generate_url(&self, name: &str) -> String {
        self.location().generate_url(name)
    }

    /// Check whether an artifact (or a namespace of artifacts) exists
    ///
    /// # Arguments
    ///
    /// * `name` - Artifact name relative to the storage root
    /// * `kind` - Whether to look for a single artifact or a namespace
    fn exists(
        &self,
        name: &str,
        kind: EntryKind,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Store an artifact and return its URL
    ///
    /// # Errors
    ///
    /// - `StorageError::ArtifactExists` if the target exists and the request
    ///   does not allow overwriting
    /// - `StorageError::InvalidArguments` if a path source cannot be read
    fn upload(
        &self,
        request: UploadRequest,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Copy an artifact to a local destination and return that destination
    ///
    /// # Errors
    ///
    /// - `StorageError::DestinationExists` if `destination` exists and
    ///   `overwrite_existing` is false
    /// - `StorageError::ArtifactNotFound` if the artifact does not exist
    fn download(
        &self,
        name: &str,
        destination: &Path,
        overwrite_existing: bool,
    ) -> impl Future<Output = Result<PathBuf, StorageError>> + Send;

    /// Read an artifact into memory
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ArtifactNotFound` if the artifact does not exist
    fn fetch(&self, name: &str) -> impl Future<Output = Result<Bytes, StorageError>> + Send;
}
