use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::offload::error::OffloadError;

/// Namespace under which one call's artifacts are stored
///
/// Either generated (`farcall_<uuid>`), or an explicit cache name chosen by
/// the caller to share results across separate submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh, unique run id
    pub fn generate() -> Self {
        Self(format!("farcall_{}", Uuid::now_v7().simple()))
    }

    /// Use an explicit cache name as run id
    ///
    /// # Errors
    ///
    /// Returns `OffloadError::InvalidRunId` if the name is empty, contains a
    /// `/`, whitespace, or is a relative path component.
    pub fn named(name: impl Into<String>) -> Result<Self, OffloadError> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("cache name cannot be empty")
        } else if name.contains('/') {
            Some("cache name cannot contain '/'")
        } else if name.chars().any(char::is_whitespace) {
            Some("cache name cannot contain whitespace")
        } else if name == "." || name.contains("..") {
            Some("cache name cannot be a relative path component")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(OffloadError::invalid_run_id(name, reason)),
            None => Ok(Self(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run identifier assignment state of a builder
///
/// `Unassigned → Generated` happens the first time a registration needs a
/// namespace; any state moves to `Cached` when call caching is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunIdentity {
    Unassigned,
    Generated { id: RunId, consumed: bool },
    Cached(RunId),
}

impl RunIdentity {
    pub(crate) fn current(&self) -> Option<&RunId> {
        match self {
            RunIdentity::Unassigned => None,
            RunIdentity::Generated { id, .. } | RunIdentity::Cached(id) => Some(id),
        }
    }
}
