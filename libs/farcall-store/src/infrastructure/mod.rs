//! Infrastructure adapters implementing the domain `StorageBackend` port

pub mod credentials;
pub mod local_store;
pub mod object_store;
pub mod s3_client;

pub use credentials::{CredentialLookup, Credentials, EnvironmentLookup};
pub use local_store::LocalFileStore;
pub use object_store::{ObjectClient, ObjectFileStore};
pub use s3_client::{S3ObjectClient, S3Settings};
