//! # Farcall TES Backend
//!
//! [`TesClient`] implements the domain `TaskBackend` port against a
//! [GA4GH Task Execution Service](https://github.com/ga4gh/task-execution-schemas)
//! v1 endpoint.
//!
//! ```rust,no_run
//! use farcall_tes::{TesClient, TesConfig};
//!
//! # fn example() -> Result<(), farcall_domain::task::TaskBackendError> {
//! let tes = TesClient::new(&TesConfig::new("http://localhost:8000"))?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod wire;

pub use client::TesClient;
pub use config::TesConfig;
