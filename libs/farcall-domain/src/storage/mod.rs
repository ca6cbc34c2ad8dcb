//! Storage domain module
//!
//! Location model, upload requests and the `StorageBackend` port shared by the
//! local and object-store adapters.

pub mod error;
pub mod location;
pub mod ports;
pub mod upload;

pub use error::StorageError;
pub use location::{Scheme, StorageLocation};
pub use ports::StorageBackend;
pub use upload::{EntryKind, UploadRequest, UploadSource};
