//! Invocation domain module
//!
//! What gets executed remotely, how it is serialized, and how a serialized
//! call is keyed for caching.

pub mod cache_key;
pub mod codec;
pub mod entity;

pub use cache_key::{CacheKey, CallArtifacts};
pub use codec::{CodecError, InvocationCodec, JsonCodec};
pub use entity::Invocation;
