//! Credential lookup
//!
//! Object stores need an access key pair. Explicit `StorageOptions` values
//! always win; whatever they leave out is discovered through a
//! `CredentialLookup`, by default environment variables followed by the AWS
//! shared profile as `aws-config` reads it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[allow(deprecated)]
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::{
    meta::region::ProvideRegion,
    profile::{ProfileFileCredentialsProvider, ProfileFileRegionProvider},
};
use aws_sdk_s3::config::ProvideCredentials;
use farcall_domain::storage::{Scheme, StorageError};
use tracing::debug;

/// An access key pair plus the settings discovered alongside it
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
    pub region: Option<String>,
    pub project: Option<String>,
    pub endpoint: Option<String>,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            region: None,
            project: None,
            endpoint: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("region", &self.region)
            .field("project", &self.project)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Port for discovering credentials of a storage scheme
#[cfg_attr(test, mockall::automock)]
pub trait CredentialLookup: Send + Sync {
    /// Credentials for `scheme`
    ///
    /// # Errors
    ///
    /// Returns `StorageError::CredentialsUnavailable` when nothing is found.
    fn lookup(&self, scheme: Scheme) -> Result<Credentials, StorageError>;
}

/// Environment variable names consulted for one scheme
struct SchemeVars {
    key: &'static str,
    secret: &'static str,
    region: &'static [&'static str],
    project: Option<&'static str>,
    endpoint: Option<&'static str>,
}

fn scheme_vars(scheme: Scheme) -> Option<SchemeVars> {
    match scheme {
        Scheme::File => None,
        Scheme::S3 => Some(SchemeVars {
            key: "AWS_ACCESS_KEY_ID",
            secret: "AWS_SECRET_ACCESS_KEY",
            region: &["AWS_REGION", "AWS_DEFAULT_REGION"],
            project: None,
            endpoint: Some("AWS_ENDPOINT_URL"),
        }),
        Scheme::Gs => Some(SchemeVars {
            key: "GS_ACCESS_KEY_ID",
            secret: "GS_SECRET_ACCESS_KEY",
            region: &[],
            project: Some("GOOGLE_CLOUD_PROJECT"),
            endpoint: None,
        }),
        Scheme::Swift => Some(SchemeVars {
            key: "SWIFT_ACCESS_KEY_ID",
            secret: "SWIFT_SECRET_ACCESS_KEY",
            region: &["SWIFT_REGION"],
            project: None,
            endpoint: Some("SWIFT_ENDPOINT_URL"),
        }),
    }
}

/// Default lookup: environment variables, then the AWS shared profile (s3)
///
/// The profile is resolved once, at construction, by the `aws-config`
/// profile providers. `AWS_SHARED_CREDENTIALS_FILE`, `AWS_CONFIG_FILE` and
/// `AWS_PROFILE` are read from the same variables as everything else.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentLookup {
    vars: HashMap<String, String>,
    profile: Option<Credentials>,
}

// `ProfileFiles` is an alias kept by aws-config for the aws-runtime type
#[allow(deprecated)]
impl EnvironmentLookup {
    /// Snapshot the process environment and resolve the AWS profile
    pub async fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        let profile_dir = vars
            .get("HOME")
            .map(|home| PathBuf::from(home).join(".aws"));
        Self::from_vars(vars, profile_dir).await
    }

    /// Lookup over explicit variables, with `profile_dir` standing in for `~/.aws`
    pub async fn from_vars<I, K, V>(vars: I, profile_dir: Option<PathBuf>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut lookup = Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            profile: None,
        };
        lookup.profile = lookup.profile_credentials(profile_dir).await;
        lookup
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// Profile files that exist, overrides first falling back to `profile_dir`
    fn profile_files(&self, profile_dir: Option<&Path>) -> Vec<(ProfileFileKind, PathBuf)> {
        let locate = |kind: ProfileFileKind, variable: &str, default: &str| {
            self.var(variable)
                .map(PathBuf::from)
                .or_else(|| profile_dir.map(|dir| dir.join(default)))
                .filter(|path| path.is_file())
                .map(|path| (kind, path))
        };

        [
            locate(ProfileFileKind::Credentials, "AWS_SHARED_CREDENTIALS_FILE", "credentials"),
            locate(ProfileFileKind::Config, "AWS_CONFIG_FILE", "config"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    async fn profile_credentials(&self, profile_dir: Option<PathBuf>) -> Option<Credentials> {
        let files = self.profile_files(profile_dir.as_deref());
        if files.is_empty() {
            return None;
        }
        let profile = self
            .var("AWS_PROFILE")
            .unwrap_or_else(|| "default".to_string());

        let profile_files = || {
            files
                .iter()
                .fold(ProfileFiles::builder(), |builder, (kind, path)| {
                    builder.with_file(*kind, path)
                })
                .build()
        };

        let provider = ProfileFileCredentialsProvider::builder()
            .profile_files(profile_files())
            .profile_name(&profile)
            .build();
        let found = match provider.provide_credentials().await {
            Ok(found) => found,
            Err(err) => {
                debug!(profile = %profile, error = %err, "No credentials in AWS profile");
                return None;
            }
        };

        let region = ProvideRegion::region(
            &ProfileFileRegionProvider::builder()
                .profile_files(profile_files())
                .profile_name(&profile)
                .build(),
        )
        .await;

        debug!(profile = %profile, "Using credentials from AWS profile files");
        Some(Credentials {
            key: found.access_key_id().to_string(),
            secret: found.secret_access_key().to_string(),
            region: region.map(|region| region.to_string()),
            project: None,
            endpoint: None,
        })
    }
}

impl CredentialLookup for EnvironmentLookup {
    fn lookup(&self, scheme: Scheme) -> Result<Credentials, StorageError> {
        let Some(names) = scheme_vars(scheme) else {
            return Err(StorageError::credentials_unavailable(
                scheme,
                "local storage takes no credentials",
            ));
        };

        if let (Some(key), Some(secret)) = (self.var(names.key), self.var(names.secret)) {
            debug!(scheme = %scheme, "Using credentials from environment");
            return Ok(Credentials {
                key,
                secret,
                region: names.region.iter().find_map(|name| self.var(name)),
                project: names.project.and_then(|name| self.var(name)),
                endpoint: names.endpoint.and_then(|name| self.var(name)),
            });
        }

        if scheme == Scheme::S3 {
            if let Some(mut credentials) = self.profile.clone() {
                credentials.endpoint = names.endpoint.and_then(|name| self.var(name));
                return Ok(credentials);
            }
        }

        Err(StorageError::credentials_unavailable(
            scheme,
            format!(
                "pass a key and secret explicitly or set {} and {}",
                names.key, names.secret
            ),
        ))
    }
}
