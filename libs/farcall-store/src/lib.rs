//! # Farcall Storage Adapters
//!
//! Implementations of the domain `StorageBackend` port:
//!
//! - [`LocalFileStore`](infrastructure::LocalFileStore) for `file://` URLs
//! - [`ObjectFileStore`](infrastructure::ObjectFileStore) over an
//!   [`ObjectClient`](infrastructure::ObjectClient), with
//!   [`S3ObjectClient`](infrastructure::S3ObjectClient) serving `s3://`,
//!   `gs://` and `swift://`
//! - [`FileStore`], which picks one of the above from a URL
//!
//! Credentials follow one precedence rule: explicit [`StorageOptions`] >
//! environment variables > AWS profile files.

pub mod config;
pub mod file_store;
pub mod infrastructure;

pub use config::StorageOptions;
pub use file_store::FileStore;
pub use infrastructure::{CredentialLookup, Credentials, EnvironmentLookup, LocalFileStore};
