//! Content-addressed cache keys
//!
//! A call is identified by the SHA-256 of its serialized invocation. Combined
//! with the run identifier it yields the names of every artifact that belongs
//! to one staged call.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::offload::run_id::RunId;

/// Lowercase hex SHA-256 of a serialized invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash serialized invocation bytes
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Artifact names of one (run, invocation) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallArtifacts {
    /// Serialized invocation
    pub invocation: String,
    /// Result written by the remote executor
    pub result: String,
    /// Claim marker holding the id of the task computing `result`
    pub task_marker: String,
}

impl CallArtifacts {
    pub fn new(run_id: &RunId, key: &CacheKey) -> Self {
        Self {
            invocation: format!("{}/invocation_{}.bin", run_id, key),
            result: format!("{}/result_{}.bin", run_id, key),
            task_marker: format!("{}/task_{}.id", run_id, key),
        }
    }

    /// Exclusive claim for replacing the marker contents `observed`
    ///
    /// Every run that wants to replace the same marker contents races for
    /// the same name, so only one of them wins each `round`.
    pub fn takeover_claim(&self, observed: &[u8], round: u32) -> String {
        let digest = CacheKey::of(observed);
        format!("{}.{}-{}.claim", self.task_marker, &digest.as_str()[..16], round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_stable_sha256() {
        let key = CacheKey::of(b"hello");
        assert_eq!(
            key.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(key, CacheKey::of(b"hello"));
        assert_ne!(key, CacheKey::of(b"hello!"));
    }

    #[test]
    fn test_same_invocation_in_different_runs_gets_separate_names() {
        let key = CacheKey::of(b"payload");
        let a = CallArtifacts::new(&RunId::named("cache-a").unwrap(), &key);
        let b = CallArtifacts::new(&RunId::named("cache-b").unwrap(), &key);

        assert_ne!(a.result, b.result);
        assert!(a.invocation.starts_with("cache-a/invocation_"));
        assert!(a.result.ends_with(&format!("result_{}.bin", key)));
        assert_eq!(a.task_marker, format!("cache-a/task_{}.id", key));
    }

    #[test]
    fn test_takeover_claims_follow_marker_contents() {
        let artifacts = CallArtifacts::new(&RunId::named("cache").unwrap(), &CacheKey::of(b"x"));

        let claim = artifacts.takeover_claim(b"task-1", 0);
        assert!(claim.starts_with(&artifacts.task_marker));
        assert_eq!(claim, artifacts.takeover_claim(b"task-1", 0));
        assert_ne!(claim, artifacts.takeover_claim(b"task-1", 1));
        assert_ne!(claim, artifacts.takeover_claim(b"task-2", 0));
    }
}
