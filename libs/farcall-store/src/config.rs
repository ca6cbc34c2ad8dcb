//! Explicit storage options
//!
//! Values set here take precedence over anything a `CredentialLookup`
//! discovers.

use std::env;

/// Explicit connection settings for object-store locations
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StorageOptions {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub region: Option<String>,
    pub project: Option<String>,
    /// S3-compatible endpoint (required for `swift://`)
    pub endpoint: Option<String>,
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options from `FARCALL_STORAGE_ENDPOINT` and `FARCALL_STORAGE_REGION`
    ///
    /// Credentials are never read here; they come from the lookup.
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|value| !value.trim().is_empty());
        Self {
            endpoint: var("FARCALL_STORAGE_ENDPOINT"),
            region: var("FARCALL_STORAGE_REGION"),
            ..Self::default()
        }
    }

    pub fn credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self.secret = Some(secret.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl std::fmt::Debug for StorageOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageOptions")
            .field("key", &self.key)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("project", &self.project)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
