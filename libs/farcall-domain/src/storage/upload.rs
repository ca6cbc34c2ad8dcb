//! Upload requests
//!
//! An upload carries its content either from a local file or from memory,
//! never both. [`UploadRequest::new`] is the single validating factory.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use uuid::Uuid;

use crate::storage::error::{Result, StorageError};

/// What `exists` should look for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A single artifact
    File,
    /// A namespace containing at least one artifact
    Directory,
}

/// Where the bytes of an upload come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    Path(PathBuf),
    Bytes(Bytes),
}

/// A validated upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    source: UploadSource,
    name: Option<String>,
    overwrite_existing: bool,
}

impl UploadRequest {
    /// Build an upload from an optional path and optional contents
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidArguments` unless exactly one of
    /// `path` and `contents` is provided.
    pub fn new(path: Option<PathBuf>, contents: Option<Bytes>) -> Result<Self> {
        let source = match (path, contents) {
            (Some(_), Some(_)) => {
                return Err(StorageError::invalid_arguments(
                    "cannot provide both a local path and contents",
                ))
            }
            (None, None) => {
                return Err(StorageError::invalid_arguments(
                    "provide either a local path or contents",
                ))
            }
            (Some(path), None) => UploadSource::Path(path),
            (None, Some(contents)) => UploadSource::Bytes(contents),
        };

        Ok(Self {
            source,
            name: None,
            overwrite_existing: false,
        })
    }

    /// Upload the file at `path`
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            source: UploadSource::Path(path.as_ref().to_path_buf()),
            name: None,
            overwrite_existing: false,
        }
    }

    /// Upload in-memory contents
    pub fn from_bytes(contents: impl Into<Bytes>) -> Self {
        Self {
            source: UploadSource::Bytes(contents.into()),
            name: None,
            overwrite_existing: false,
        }
    }

    /// Store the artifact under `name` (relative to the storage root)
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Allow replacing an existing artifact
    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    pub fn source(&self) -> &UploadSource {
        &self.source
    }

    pub fn allows_overwrite(&self) -> bool {
        self.overwrite_existing
    }

    /// The artifact name to write
    ///
    /// Falls back to the source file's base name, or a random `tmp<uuid>`
    /// name for in-memory contents.
    pub fn resolve_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.trim_start_matches('/').to_string();
        }
        match &self.source {
            UploadSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(random_name),
            UploadSource::Bytes(_) => random_name(),
        }
    }

    /// Read the upload's contents into memory
    pub async fn read_contents(&self) -> Result<Bytes> {
        match &self.source {
            UploadSource::Bytes(bytes) => Ok(bytes.clone()),
            UploadSource::Path(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|err| match err.kind() {
                    std::io::ErrorKind::NotFound => {
                        StorageError::invalid_arguments(format!(
                            "upload source '{}' does not exist",
                            path.display()
                        ))
                    }
                    _ => StorageError::io(path, err),
                }),
        }
    }
}

fn random_name() -> String {
    format!("tmp{}", Uuid::now_v7().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_sources_rejected() {
        let err = UploadRequest::new(Some(PathBuf::from("/tmp/foo.txt")), Some(Bytes::from("hello")))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArguments(_)));
    }

    #[test]
    fn test_no_source_rejected() {
        let err = UploadRequest::new(None, None).unwrap_err();
        assert!(matches!(err, StorageError::InvalidArguments(_)));
    }

    #[test]
    fn test_name_defaults_to_file_basename() {
        let request = UploadRequest::from_path("/tmp/inputs/reads.fastq");
        assert_eq!(request.resolve_name(), "reads.fastq");
    }

    #[test]
    fn test_name_is_random_for_contents() {
        let request = UploadRequest::from_bytes("hello");
        let name = request.resolve_name();
        assert!(name.starts_with("tmp"));
        assert_ne!(name, request.resolve_name());
    }

    #[test]
    fn test_explicit_name_and_overwrite() {
        let request = UploadRequest::from_bytes("x")
            .named("/run/a.txt")
            .overwrite_existing(true);
        assert_eq!(request.resolve_name(), "run/a.txt");
        assert!(request.allows_overwrite());
    }
}
