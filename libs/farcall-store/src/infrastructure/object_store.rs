//! Object-store storage
//!
//! `ObjectFileStore` implements the storage contract for bucket-based
//! services on top of a small `ObjectClient` port, so the same code serves
//! every S3-compatible endpoint and can be tested without a network.

use std::future::Future;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use farcall_domain::{
    ports::StorageBackend,
    storage::{EntryKind, StorageError, StorageLocation, UploadRequest},
};
use tracing::{debug, instrument};

use crate::infrastructure::local_store::{path_exists, write_atomic};

type Result<T> = std::result::Result<T, StorageError>;

/// Port for the handful of object operations the store needs
///
/// "Not found" is a value (`false` / `None`), never an error.
pub trait ObjectClient: Send + Sync + 'static {
    /// Create `bucket` unless it already exists
    fn ensure_bucket(&self, bucket: &str) -> impl Future<Output = Result<()>> + Send;

    /// Write an object in a single request
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Write an object only if `key` is free
    ///
    /// Returns `false` without writing when the key already exists. The check
    /// and the write are one request so concurrent creators cannot both win.
    fn create_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    fn head_object(&self, bucket: &str, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Whether at least one key starts with `prefix`
    fn has_prefix(&self, bucket: &str, prefix: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Object-store implementation of the `StorageBackend` port
///
/// Artifact `name` maps to key `<location path>/<name>` in the location's
/// bucket.
#[derive(Debug, Clone)]
pub struct ObjectFileStore<C> {
    location: StorageLocation,
    client: C,
}

impl<C> ObjectFileStore<C>
where
    C: ObjectClient,
{
    /// Open a store on `location`, creating the bucket if needed
    pub async fn open(location: StorageLocation, client: C) -> Result<Self> {
        if location.scheme().is_local() {
            return Err(StorageError::invalid_location(
                location.to_string(),
                "not an object-store location",
            ));
        }
        client.ensure_bucket(location.bucket()).await?;
        Ok(Self { location, client })
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C> StorageBackend for ObjectFileStore<C>
where
    C: ObjectClient,
{
    fn location(&self) -> &StorageLocation {
        &self.location
    }

    async fn exists(&self, name: &str, kind: EntryKind) -> Result<bool> {
        let key = self.location.key(name);
        let bucket = self.location.bucket();
        match kind {
            EntryKind::File => self.client.head_object(bucket, &key).await,
            EntryKind::Directory => {
                let prefix = format!("{}/", key.trim_end_matches('/'));
                self.client.has_prefix(bucket, &prefix).await
            }
        }
    }

    #[instrument(skip(self, request), fields(bucket = %self.location.bucket()))]
    async fn upload(&self, request: UploadRequest) -> Result<String> {
        let name = request.resolve_name();
        let key = self.location.key(&name);
        let bucket = self.location.bucket();

        if !request.allows_overwrite() && self.client.head_object(bucket, &key).await? {
            return Err(StorageError::ArtifactExists(name));
        }

        let body = request.read_contents().await?;
        debug!(key = %key, size = body.len(), "Putting object");
        if request.allows_overwrite() {
            self.client.put_object(bucket, &key, body).await?;
        } else if !self.client.create_object(bucket, &key, body).await? {
            return Err(StorageError::ArtifactExists(name));
        }
        Ok(self.generate_url(&name))
    }

    #[instrument(skip(self), fields(bucket = %self.location.bucket()))]
    async fn download(
        &self,
        name: &str,
        destination: &Path,
        overwrite_existing: bool,
    ) -> Result<PathBuf> {
        if !overwrite_existing && path_exists(destination).await? {
            return Err(StorageError::DestinationExists(destination.to_path_buf()));
        }

        let body = self.fetch(name).await?;
        if !write_atomic(destination, body, overwrite_existing).await? {
            return Err(StorageError::DestinationExists(destination.to_path_buf()));
        }
        Ok(destination.to_path_buf())
    }

    async fn fetch(&self, name: &str) -> Result<Bytes> {
        let key = self.location.key(name);
        self.client
            .get_object(self.location.bucket(), &key)
            .await?
            .ok_or_else(|| StorageError::ArtifactNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct InMemoryObjects {
        buckets: Arc<Mutex<BTreeSet<String>>>,
        objects: Arc<Mutex<BTreeMap<(String, String), Bytes>>>,
    }

    impl ObjectClient for InMemoryObjects {
        async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
            self.buckets.lock().unwrap().insert(bucket.to_string());
            Ok(())
        }

        async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), body);
            Ok(())
        }

        async fn create_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<bool> {
            let mut objects = self.objects.lock().unwrap();
            let slot = (bucket.to_string(), key.to_string());
            if objects.contains_key(&slot) {
                return Ok(false);
            }
            objects.insert(slot, body);
            Ok(true)
        }

        async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned())
        }

        async fn head_object(&self, bucket: &str, key: &str) -> Result<bool> {
            Ok(self.get_object(bucket, key).await?.is_some())
        }

        async fn has_prefix(&self, bucket: &str, prefix: &str) -> Result<bool> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .keys()
                .any(|(b, key)| b == bucket && key.starts_with(prefix)))
        }
    }

    async fn store(url: &str) -> ObjectFileStore<InMemoryObjects> {
        let location = StorageLocation::parse(url).unwrap();
        ObjectFileStore::open(location, InMemoryObjects::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_bucket() {
        let store = store("gs://farcall-test/base").await;
        assert!(store.client().buckets.lock().unwrap().contains("farcall-test"));
    }

    #[tokio::test]
    async fn test_keys_are_prefixed_with_location_path() {
        let store = store("s3://bucket/base").await;

        let url = store
            .upload(UploadRequest::from_bytes("payload").named("run/result.bin"))
            .await
            .unwrap();

        assert_eq!(url, "s3://bucket/base/run/result.bin");
        let stored = store
            .client()
            .objects
            .lock()
            .unwrap()
            .get(&("bucket".to_string(), "base/run/result.bin".to_string()))
            .cloned();
        assert_eq!(stored, Some(Bytes::from("payload")));
    }

    #[tokio::test]
    async fn test_exists_file_and_namespace() {
        let store = store("swift://container").await;
        store
            .upload(UploadRequest::from_bytes("x").named("run1/a.txt"))
            .await
            .unwrap();

        assert!(store.exists("run1/a.txt", EntryKind::File).await.unwrap());
        assert!(store.exists("run1", EntryKind::Directory).await.unwrap());
        assert!(!store.exists("run", EntryKind::Directory).await.unwrap());
        assert!(!store.exists("run1", EntryKind::File).await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_guard() {
        let store = store("s3://bucket").await;
        store
            .upload(UploadRequest::from_bytes("one").named("a"))
            .await
            .unwrap();

        let err = store
            .upload(UploadRequest::from_bytes("two").named("a"))
            .await
            .unwrap_err();
        assert_eq!(err, StorageError::ArtifactExists("a".to_string()));

        store
            .upload(UploadRequest::from_bytes("two").named("a").overwrite_existing(true))
            .await
            .unwrap();
        assert_eq!(store.fetch("a").await.unwrap(), Bytes::from("two"));
    }

    #[tokio::test]
    async fn test_concurrent_creates_have_one_winner() {
        let store = store("s3://bucket").await;

        let (first, second) = tokio::join!(
            store.upload(UploadRequest::from_bytes("first").named("claim")),
            store.upload(UploadRequest::from_bytes("second").named("claim")),
        );

        assert_eq!([&first, &second].iter().filter(|r| r.is_ok()).count(), 1);
        let stored = store.fetch("claim").await.unwrap();
        let winner = if first.is_ok() { "first" } else { "second" };
        assert_eq!(stored, Bytes::from(winner));
    }

    #[tokio::test]
    async fn test_download_round_trip_and_guards() {
        let dir = tempfile::tempdir().unwrap();
        let store = store("s3://bucket/prefix").await;
        store
            .upload(UploadRequest::from_bytes(vec![0u8, 159, 146, 150]).named("blob.bin"))
            .await
            .unwrap();
        let destination = dir.path().join("blob.bin");

        store.download("blob.bin", &destination, false).await.unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), vec![0u8, 159, 146, 150]);

        let err = store
            .download("blob.bin", &destination, false)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DestinationExists(_)));

        let err = store
            .download("other.bin", &dir.path().join("other.bin"), false)
            .await
            .unwrap_err();
        assert_eq!(err, StorageError::ArtifactNotFound("other.bin".to_string()));
    }
}
