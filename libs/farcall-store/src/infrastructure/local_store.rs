//! Local filesystem storage
//!
//! Artifacts are plain files under the root directory of a `file://`
//! location. Writes go through a temporary file in the destination directory
//! that is renamed into place, so readers never see a partial artifact.

use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use farcall_domain::{
    ports::StorageBackend,
    storage::{EntryKind, StorageError, StorageLocation, UploadRequest},
};
use tracing::{debug, info, instrument};

type Result<T> = std::result::Result<T, StorageError>;

/// Filesystem-backed implementation of the `StorageBackend` port
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    location: StorageLocation,
}

impl LocalFileStore {
    /// Open a local store, creating its root directory if needed
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidLocation` if `location` is not a
    /// `file://` location.
    pub async fn open(location: StorageLocation) -> Result<Self> {
        if !location.scheme().is_local() {
            return Err(StorageError::invalid_location(
                location.to_string(),
                "not a local location",
            ));
        }

        let root = Path::new(location.path());
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|err| StorageError::io(root, err))?;
        info!(root = %root.display(), "Opened local file store");

        Ok(Self { location })
    }

    /// Parse `url` and open it
    pub async fn connect(url: &str) -> Result<Self> {
        Self::open(StorageLocation::parse(url)?).await
    }

    fn artifact_path(&self, name: &str) -> Result<PathBuf> {
        if Path::new(name)
            .components()
            .any(|component| component == Component::ParentDir)
        {
            return Err(StorageError::invalid_arguments(format!(
                "artifact name '{}' escapes the storage root",
                name
            )));
        }
        Ok(self.location.local_path(name))
    }
}

impl StorageBackend for LocalFileStore {
    fn location(&self) -> &StorageLocation {
        &self.location
    }

    #[instrument(skip(self))]
    async fn exists(&self, name: &str, kind: EntryKind) -> Result<bool> {
        let path = self.artifact_path(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(match kind {
                EntryKind::File => metadata.is_file(),
                EntryKind::Directory => metadata.is_dir(),
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::io(&path, err)),
        }
    }

    #[instrument(skip(self, request), fields(overwrite = request.allows_overwrite()))]
    async fn upload(&self, request: UploadRequest) -> Result<String> {
        let name = request.resolve_name();
        let path = self.artifact_path(&name)?;
        let overwrite = request.allows_overwrite();

        if !overwrite && self.exists(&name, EntryKind::File).await? {
            return Err(StorageError::ArtifactExists(name));
        }

        let contents = request.read_contents().await?;
        let size = contents.len();
        if !write_atomic(&path, contents, overwrite).await? {
            return Err(StorageError::ArtifactExists(name));
        }

        debug!(name = %name, size, "Stored artifact");
        Ok(self.generate_url(&name))
    }

    #[instrument(skip(self))]
    async fn download(
        &self,
        name: &str,
        destination: &Path,
        overwrite_existing: bool,
    ) -> Result<PathBuf> {
        if !overwrite_existing && path_exists(destination).await? {
            return Err(StorageError::DestinationExists(destination.to_path_buf()));
        }

        let contents = self.fetch(name).await?;
        if !write_atomic(destination, contents, overwrite_existing).await? {
            return Err(StorageError::DestinationExists(destination.to_path_buf()));
        }
        Ok(destination.to_path_buf())
    }

    async fn fetch(&self, name: &str) -> Result<Bytes> {
        let path = self.artifact_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Bytes::from(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::ArtifactNotFound(name.to_string()))
            }
            Err(err) => Err(StorageError::io(&path, err)),
        }
    }
}

pub(crate) async fn path_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|err| StorageError::io(path, err))
}

/// Write `contents` to `destination` through a temporary file
///
/// Returns `false` without writing when `overwrite` is off and the
/// destination appeared before the rename.
pub(crate) async fn write_atomic(destination: &Path, contents: Bytes, overwrite: bool) -> Result<bool> {
    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|err| StorageError::io(&parent, err))?;

        let mut staging =
            tempfile::NamedTempFile::new_in(&parent).map_err(|err| StorageError::io(&parent, err))?;
        staging
            .write_all(&contents)
            .and_then(|_| staging.as_file().sync_all())
            .map_err(|err| StorageError::io(staging.path(), err))?;

        let persisted = if overwrite {
            staging.persist(&destination)
        } else {
            staging.persist_noclobber(&destination)
        };
        match persisted {
            Ok(_) => Ok(true),
            Err(err) if !overwrite && err.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(StorageError::io(&destination, err.error)),
        }
    })
    .await
    .map_err(|err| StorageError::backend_failure(format!("staging task failed: {}", err)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, LocalFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}/store", dir.path().display());
        let store = LocalFileStore::connect(&url).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_root_is_created() {
        let (dir, store) = store().await;
        assert!(dir.path().join("store").is_dir());

        // Opening again reuses the directory
        LocalFileStore::open(store.location().clone()).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_fetch_round_trip() {
        let (_dir, store) = store().await;

        let url = store
            .upload(UploadRequest::from_bytes("hello").named("run/a.txt"))
            .await
            .unwrap();

        assert_eq!(url, store.generate_url("run/a.txt"));
        assert_eq!(store.fetch("run/a.txt").await.unwrap().as_ref(), b"hello");
        assert!(store.exists("run/a.txt", EntryKind::File).await.unwrap());
        assert!(store.exists("run", EntryKind::Directory).await.unwrap());
        assert!(!store.exists("run", EntryKind::File).await.unwrap());
        assert!(!store.exists("missing", EntryKind::File).await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_guard() {
        let (_dir, store) = store().await;
        let first = UploadRequest::from_bytes("one").named("a.txt");
        store.upload(first.clone()).await.unwrap();

        let err = store.upload(first).await.unwrap_err();
        assert_eq!(err, StorageError::ArtifactExists("a.txt".to_string()));

        store
            .upload(
                UploadRequest::from_bytes("two")
                    .named("a.txt")
                    .overwrite_existing(true),
            )
            .await
            .unwrap();
        assert_eq!(store.fetch("a.txt").await.unwrap().as_ref(), b"two");
    }

    #[tokio::test]
    async fn test_noclobber_rename_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("taken.bin");
        std::fs::write(&target, b"first").unwrap();

        let written = write_atomic(&target, Bytes::from("second"), false).await.unwrap();

        assert!(!written);
        assert_eq!(std::fs::read(&target).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_download_guards() {
        let (dir, store) = store().await;
        store
            .upload(UploadRequest::from_bytes("data").named("x.bin"))
            .await
            .unwrap();
        let destination = dir.path().join("out/x.bin");

        let path = store.download("x.bin", &destination, false).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"data");

        let err = store.download("x.bin", &destination, false).await.unwrap_err();
        assert!(matches!(err, StorageError::DestinationExists(_)));
        store.download("x.bin", &destination, true).await.unwrap();

        let err = store
            .download("nope.bin", &dir.path().join("nope.bin"), false)
            .await
            .unwrap_err();
        assert_eq!(err, StorageError::ArtifactNotFound("nope.bin".to_string()));
    }

    #[tokio::test]
    async fn test_upload_from_path_uses_basename() {
        let (dir, store) = store().await;
        let source = dir.path().join("reads.fastq");
        std::fs::write(&source, b"@r1").unwrap();

        let url = store.upload(UploadRequest::from_path(&source)).await.unwrap();

        assert!(url.ends_with("/store/reads.fastq"));
        assert_eq!(store.fetch("reads.fastq").await.unwrap().as_ref(), b"@r1");
    }

    #[tokio::test]
    async fn test_names_cannot_escape_root() {
        let (_dir, store) = store().await;
        let err = store
            .upload(UploadRequest::from_bytes("x").named("../outside.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_object_location_rejected() {
        let location = StorageLocation::parse("s3://bucket").unwrap();
        let err = LocalFileStore::open(location).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidLocation { .. }));
    }
}
