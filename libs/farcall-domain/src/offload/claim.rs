//! Task marker contents
//!
//! The marker next to a call's artifacts is how concurrent runs of the same
//! invocation agree on a single submission. It is created exclusively before
//! submitting and moves through:
//!
//! ```text
//! claim:<token>  ->  <task id>
//!                ->  released:<token>   (the submission failed)
//! ```

use uuid::Uuid;

use crate::task::TaskId;

const CLAIM_PREFIX: &str = "claim:";
const RELEASED_PREFIX: &str = "released:";

/// What a task marker currently says
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Marker {
    /// A run holds the claim and is submitting
    Pending,
    /// The claimant gave up; anyone may claim again
    Released,
    /// A task was submitted for the call
    Task(TaskId),
}

impl Marker {
    pub(crate) fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim();
        if text.starts_with(CLAIM_PREFIX) {
            Marker::Pending
        } else if text.is_empty() || text.starts_with(RELEASED_PREFIX) {
            Marker::Released
        } else {
            Marker::Task(TaskId::new(text))
        }
    }
}

/// Marker contents of one run's claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClaimToken(String);

impl ClaimToken {
    pub(crate) fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Contents while submitting
    pub(crate) fn pending(&self) -> String {
        format!("{}{}", CLAIM_PREFIX, self.0)
    }

    /// Contents after a failed submission
    pub(crate) fn released(&self) -> String {
        format!("{}{}", RELEASED_PREFIX, self.0)
    }
}
