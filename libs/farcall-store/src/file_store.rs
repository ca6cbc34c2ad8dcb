//! URL-driven storage facade
//!
//! `FileStore::connect` picks the adapter matching a storage URL, so callers
//! can configure storage with a single string.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use farcall_domain::{
    ports::StorageBackend,
    storage::{EntryKind, StorageError, StorageLocation, UploadRequest},
};
use tracing::info;

use crate::config::StorageOptions;
use crate::infrastructure::{
    CredentialLookup, EnvironmentLookup, LocalFileStore, ObjectFileStore, S3ObjectClient, S3Settings,
};

/// Storage for any supported scheme
#[derive(Clone)]
pub enum FileStore {
    Local(LocalFileStore),
    Object(ObjectFileStore<S3ObjectClient>),
}

impl FileStore {
    /// Connect to `url`, discovering credentials from the environment
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use farcall_store::{FileStore, StorageOptions};
    ///
    /// # async fn example() -> Result<(), farcall_domain::StorageError> {
    /// let local = FileStore::connect("./farcall-store", StorageOptions::new()).await?;
    /// let s3 = FileStore::connect("s3://my-bucket/runs", StorageOptions::new().region("eu-west-3")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str, options: StorageOptions) -> Result<Self, StorageError> {
        Self::connect_with(url, options, &EnvironmentLookup::from_env().await).await
    }

    /// Connect to `url` using `lookup` for whatever `options` leave out
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidLocation` for malformed or unsupported URLs
    /// - `StorageError::CredentialsUnavailable` for object stores without
    ///   credentials
    pub async fn connect_with(
        url: &str,
        options: StorageOptions,
        lookup: &dyn CredentialLookup,
    ) -> Result<Self, StorageError> {
        let location = StorageLocation::parse(url)?;
        if location.scheme().is_local() {
            return Ok(Self::Local(LocalFileStore::open(location).await?));
        }

        let settings = S3Settings::resolve(&location, &options, lookup)?;
        let client = S3ObjectClient::connect(&settings).await;
        let store = ObjectFileStore::open(location, client).await?;
        info!(location = %store.location(), "Connected to object store");
        Ok(Self::Object(store))
    }
}

impl StorageBackend for FileStore {
    fn location(&self) -> &StorageLocation {
        match self {
            FileStore::Local(store) => store.location(),
            FileStore::Object(store) => store.location(),
        }
    }

    async fn exists(&self, name: &str, kind: EntryKind) -> Result<bool, StorageError> {
        match self {
            FileStore::Local(store) => store.exists(name, kind).await,
            FileStore::Object(store) => store.exists(name, kind).await,
        }
    }

    async fn upload(&self, request: UploadRequest) -> Result<String, StorageError> {
        match self {
            FileStore::Local(store) => store.upload(request).await,
            FileStore::Object(store) => store.upload(request).await,
        }
    }

    async fn download(
        &self,
        name: &str,
        destination: &Path,
        overwrite_existing: bool,
    ) -> Result<PathBuf, StorageError> {
        match self {
            FileStore::Local(store) => store.download(name, destination, overwrite_existing).await,
            FileStore::Object(store) => store.download(name, destination, overwrite_existing).await,
        }
    }

    async fn fetch(&self, name: &str) -> Result<Bytes, StorageError> {
        match self {
            FileStore::Local(store) => store.fetch(name).await,
            FileStore::Object(store) => store.fetch(name).await,
        }
    }
}
