//! Storage location model
//!
//! A `StorageLocation` is the validated, normalized form of a storage URL
//! (`scheme://[bucket]/path`). It is the only place where artifact URLs and
//! object keys are composed, so URL generation stays a pure function of
//! scheme, bucket, path and artifact name.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::storage::error::{Result, StorageError};

/// Storage schemes understood by Farcall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Local filesystem (`file://`)
    File,
    /// Amazon S3 (`s3://`)
    S3,
    /// Google Cloud Storage through its S3-interoperable API (`gs://`)
    Gs,
    /// OpenStack Swift through the `s3api` middleware (`swift://`)
    Swift,
}

impl Scheme {
    /// Every supported scheme, local first
    pub const ALL: [Scheme; 4] = [Scheme::File, Scheme::S3, Scheme::Gs, Scheme::Swift];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::File => "file",
            Scheme::S3 => "s3",
            Scheme::Gs => "gs",
            Scheme::Swift => "swift",
        }
    }

    /// `true` for the local filesystem scheme
    pub fn is_local(&self) -> bool {
        matches!(self, Scheme::File)
    }

    fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(Scheme::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Scheme::ALL
            .into_iter()
            .find(|scheme| scheme.as_str() == s)
            .ok_or_else(|| {
                StorageError::invalid_location(
                    s,
                    format!(
                        "unsupported scheme '{}' - must be one of {}",
                        s,
                        Scheme::supported_list()
                    ),
                )
            })
    }
}

/// Validated root of a storage space
///
/// Invariants:
/// - `scheme` is one of [`Scheme::ALL`]
/// - local locations have an empty bucket and an absolute, normalized path
///   without a trailing slash
/// - object-store locations have a non-empty bucket and a key prefix without
///   leading or trailing slashes (possibly empty)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocation {
    scheme: Scheme,
    bucket: String,
    path: String,
}

impl StorageLocation {
    /// Parse and normalize a storage URL
    ///
    /// A URL without a scheme is treated as a local path resolved against the
    /// current working directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidLocation` for unsupported schemes,
    /// `file://` URLs with a network location, and object-store URLs
    /// without a bucket.
    pub fn parse(url: &str) -> Result<Self> {
        let Some((scheme, rest)) = url.split_once("://") else {
            return Self::local(Path::new(url)).map_err(|reason| {
                StorageError::invalid_location(url, reason)
            });
        };

        let scheme = if scheme.is_empty() {
            Scheme::File
        } else {
            scheme.parse::<Scheme>().map_err(|err| match err {
                StorageError::InvalidLocation { reason, .. } => {
                    StorageError::invalid_location(url, reason)
                }
                other => other,
            })?
        };

        if scheme.is_local() {
            if !rest.starts_with('/') {
                return Err(StorageError::invalid_location(
                    url,
                    "file URLs must not carry a network location",
                ));
            }
            return Self::local(Path::new(rest))
                .map_err(|reason| StorageError::invalid_location(url, reason));
        }

        let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(StorageError::invalid_location(
                url,
                format!("{} URLs must name a bucket", scheme),
            ));
        }

        Ok(Self {
            scheme,
            bucket: bucket.to_string(),
            path: normalize_key(path),
        })
    }

    fn local(path: &Path) -> std::result::Result<Self, String> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|err| format!("cannot resolve working directory: {}", err))?
                .join(path)
        };

        let normalized = normalize_local(&absolute);
        let mut path = normalized.to_string_lossy().into_owned();
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }

        Ok(Self {
            scheme: Scheme::File,
            bucket: String::new(),
            path,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Bucket/container name (empty for local locations)
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Local root directory, or object key prefix
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Compose the backend key for an artifact name
    ///
    /// For local locations this is the absolute file path, for object stores
    /// the full object key inside the bucket.
    pub fn key(&self, name: &str) -> String {
        let name = name.trim_start_matches('/');
        if self.scheme.is_local() {
            if self.path == "/" {
                format!("/{}", name)
            } else {
                format!("{}/{}", self.path, name)
            }
        } else if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path, name)
        }
    }

    /// Filesystem path of an artifact in a local location
    pub fn local_path(&self, name: &str) -> PathBuf {
        PathBuf::from(self.key(name))
    }

    /// Deterministic URL of an artifact, whether or not it exists yet
    pub fn generate_url(&self, name: &str) -> String {
        if self.scheme.is_local() {
            format!("file://{}", self.key(name))
        } else {
            format!("{}://{}/{}", self.scheme, self.bucket, self.key(name))
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scheme.is_local() {
            write!(f, "file://{}", self.path)
        } else if self.path.is_empty() {
            write!(f, "{}://{}", self.scheme, self.bucket)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.bucket, self.path)
        }
    }
}

impl FromStr for StorageLocation {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Lexically collapse `.` and `..` components of an absolute path
fn normalize_local(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push("/");
    }
    out
}

/// Strip leading/trailing slashes and collapse empty segments of an object key
fn normalize_key(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
