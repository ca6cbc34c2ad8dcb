//! S3-compatible object client
//!
//! This module implements the `ObjectClient` port using the AWS S3 SDK. The
//! same client serves Amazon S3, Google Cloud Storage (HMAC interoperability
//! keys) and OpenStack Swift (`s3api` middleware); only the endpoint and
//! addressing style differ. AWS SDK errors are converted to domain errors.

use aws_sdk_s3::{
    config::{BehaviorVersion, Region},
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client,
};
use bytes::Bytes;
use farcall_domain::storage::{Scheme, StorageError, StorageLocation};
use tracing::{debug, error, info, instrument, warn};

use crate::config::StorageOptions;
use crate::infrastructure::{
    credentials::{CredentialLookup, Credentials},
    object_store::ObjectClient,
};

/// Endpoint of the Google Cloud Storage XML API
pub const GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// Region used for `s3://` when none is configured or discovered
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Region used for `gs://` and `swift://` when none is configured
pub const DEFAULT_INTEROP_REGION: &str = "auto";

/// Fully resolved connection settings for one object-store location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub scheme: Scheme,
    pub credentials: Credentials,
    pub region: String,
    pub project: Option<String>,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
}

impl S3Settings {
    /// Merge explicit options with discovered credentials
    ///
    /// Explicit values win field by field. The lookup is only consulted when
    /// the key pair is not fully given.
    ///
    /// # Errors
    ///
    /// - `StorageError::CredentialsUnavailable` if no key pair can be found
    /// - `StorageError::InvalidLocation` for a `swift://` location without an
    ///   endpoint
    pub fn resolve(
        location: &StorageLocation,
        options: &StorageOptions,
        lookup: &dyn CredentialLookup,
    ) -> Result<Self, StorageError> {
        let scheme = location.scheme();
        let discovered = match (&options.key, &options.secret) {
            (Some(key), Some(secret)) => Credentials::new(key.clone(), secret.clone()),
            _ => {
                let mut found = lookup.lookup(scheme)?;
                if let Some(key) = &options.key {
                    found.key = key.clone();
                }
                if let Some(secret) = &options.secret {
                    found.secret = secret.clone();
                }
                found
            }
        };

        let region = options
            .region
            .clone()
            .or_else(|| discovered.region.clone())
            .unwrap_or_else(|| match scheme {
                Scheme::S3 => DEFAULT_S3_REGION.to_string(),
                _ => DEFAULT_INTEROP_REGION.to_string(),
            });
        let project = options
            .project
            .clone()
            .or_else(|| discovered.project.clone());
        let endpoint = options
            .endpoint
            .clone()
            .or_else(|| discovered.endpoint.clone())
            .or_else(|| (scheme == Scheme::Gs).then(|| GCS_ENDPOINT.to_string()));

        if scheme == Scheme::Swift && endpoint.is_none() {
            return Err(StorageError::invalid_location(
                location.to_string(),
                "swift locations need an S3-compatible endpoint (StorageOptions::endpoint or SWIFT_ENDPOINT_URL)",
            ));
        }

        // Path-style addressing for Swift and custom S3 endpoints
        let force_path_style =
            scheme == Scheme::Swift || (scheme == Scheme::S3 && endpoint.is_some());

        Ok(Self {
            scheme,
            credentials: Credentials::new(discovered.key, discovered.secret),
            region,
            project,
            endpoint,
            force_path_style,
        })
    }
}

/// S3-based implementation of the `ObjectClient` port
///
/// ## Error Handling
///
/// "Not found" responses become `Ok(false)` / `Ok(None)`; every other SDK
/// error becomes `StorageError::BackendFailure` with the failing operation
/// and key in the message.
#[derive(Clone)]
pub struct S3ObjectClient {
    client: Client,
    region: String,
}

impl S3ObjectClient {
    /// Wrap an already configured SDK client
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use aws_sdk_s3::Client;
    /// use farcall_store::infrastructure::S3ObjectClient;
    ///
    /// # async fn example() {
    /// let config = aws_config::load_from_env().await;
    /// let client = S3ObjectClient::new(Client::new(&config), "us-east-1");
    /// # }
    /// ```
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Build an SDK client from resolved settings
    pub async fn connect(settings: &S3Settings) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            settings.credentials.key.clone(),
            settings.credentials.secret.clone(),
            None,
            None,
            "farcall",
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint {
            s3_config = s3_config.endpoint_url(endpoint);
        }
        if settings.force_path_style {
            s3_config = s3_config.force_path_style(true);
        }

        info!(
            scheme = %settings.scheme,
            region = %settings.region,
            endpoint = ?settings.endpoint,
            project = ?settings.project,
            "Initializing S3 object client"
        );
        Self::new(Client::from_conf(s3_config.build()), settings.region.clone())
    }

    fn location_constraint(&self) -> Option<CreateBucketConfiguration> {
        if self.region == DEFAULT_S3_REGION || self.region == DEFAULT_INTEROP_REGION {
            return None;
        }
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build(),
        )
    }
}

impl ObjectClient for S3ObjectClient {
    #[instrument(skip(self))]
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                debug!("Bucket exists");
                return Ok(());
            }
            Err(err) => {
                let service_error = err.into_service_error();
                if !service_error.is_not_found() {
                    error!(error = ?service_error, "Failed to check bucket");
                    return Err(StorageError::backend_failure(format!(
                        "S3 head_bucket failed for bucket '{}': {}",
                        bucket, service_error
                    )));
                }
            }
        }

        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(configuration) = self.location_constraint() {
            request = request.create_bucket_configuration(configuration);
        }
        match request.send().await {
            Ok(_) => {
                info!("Created bucket");
                Ok(())
            }
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_bucket_already_owned_by_you() {
                    Ok(())
                } else {
                    error!(error = ?service_error, "Failed to create bucket");
                    Err(StorageError::backend_failure(format!(
                        "S3 create_bucket failed for bucket '{}': {}",
                        bucket, service_error
                    )))
                }
            }
        }
    }

    #[instrument(skip(self, body), fields(size = body.len()))]
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), StorageError> {
        match self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
        {
            Ok(_) => {
                debug!("Stored object");
                Ok(())
            }
            Err(err) => {
                error!(error = ?err, "Failed to store object");
                Err(StorageError::backend_failure(format!(
                    "S3 put_object failed for key '{}': {}",
                    key, err
                )))
            }
        }
    }

    #[instrument(skip(self, body), fields(size = body.len()))]
    async fn create_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<bool, StorageError> {
        match self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .if_none_match("*")
            .body(ByteStream::from(body))
            .send()
            .await
        {
            Ok(_) => {
                debug!("Created object");
                Ok(true)
            }
            // 412 when the key exists, 409 when a concurrent create is in progress
            Err(err) if matches!(err.raw_response().map(|raw| raw.status().as_u16()), Some(409 | 412)) => {
                debug!("Object already exists, not overwriting");
                Ok(false)
            }
            Err(err) => {
                error!(error = ?err, "Failed to create object");
                Err(StorageError::backend_failure(format!(
                    "S3 conditional put_object failed for key '{}': {}",
                    key, err
                )))
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>, StorageError> {
        match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => match output.body.collect().await {
                Ok(data) => {
                    let bytes = data.into_bytes();
                    debug!(size = bytes.len(), "Retrieved object");
                    Ok(Some(bytes))
                }
                Err(err) => {
                    error!(error = ?err, "Failed to read object body");
                    Err(StorageError::backend_failure(format!(
                        "Failed to read S3 object body for key '{}': {}",
                        key, err
                    )))
                }
            },
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_no_such_key() {
                    Ok(None)
                } else {
                    warn!(error = ?service_error, "Failed to retrieve object");
                    Err(StorageError::backend_failure(format!(
                        "S3 get_object failed for key '{}': {}",
                        key, service_error
                    )))
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    error!(error = ?service_error, "Failed to check object existence");
                    Err(StorageError::backend_failure(format!(
                        "S3 head_object failed for key '{}': {}",
                        key, service_error
                    )))
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn has_prefix(&self, bucket: &str, prefix: &str) -> Result<bool, StorageError> {
        match self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
        {
            Ok(output) => Ok(!output.contents().is_empty()),
            Err(err) => {
                error!(error = ?err, "Failed to list objects");
                Err(StorageError::backend_failure(format!(
                    "S3 list_objects_v2 failed for prefix '{}': {}",
                    prefix, err
                )))
            }
        }
    }
}
