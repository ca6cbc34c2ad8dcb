//! Offload module
//!
//! Configuring a remote call, resolving its run namespace, and submitting it
//! to the task backend.

pub mod builder;
mod claim;
pub mod config;
pub mod error;
pub mod run_id;
pub mod submitter;

pub use builder::InvocationBuilder;
pub use config::{ExecutorConfig, PollConfig, ResourceRequest};
pub use error::OffloadError;
pub use run_id::RunId;
pub use submitter::{StagedCall, TaskSubmitter, RUNNER_SCRIPT};
