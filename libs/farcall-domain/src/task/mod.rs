//! Task domain module
//!
//! The task description submitted to the execution backend, its lifecycle
//! states, and the `TaskBackend` port.

pub mod entity;
pub mod error;
pub mod ids;
pub mod ports;
pub mod state;

pub use entity::{Executor, Resources, TaskDescription, TaskInput, TaskOutput};
pub use error::TaskBackendError;
pub use ids::TaskId;
pub use ports::TaskBackend;
pub use state::TaskState;
