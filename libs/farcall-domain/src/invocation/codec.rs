//! Invocation codec port
//!
//! The codec turns an invocation into the opaque blob shipped to the remote
//! executor, and turns the result blob written by the executor back into a
//! value. The rest of the domain never looks inside either blob.

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::invocation::entity::Invocation;

/// Errors raised while encoding or decoding blobs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The invocation itself is malformed
    #[error("Invalid invocation: {0}")]
    InvalidInvocation(String),

    /// The invocation could not be serialized
    #[error("Failed to encode invocation: {0}")]
    Encode(String),

    /// A result blob could not be deserialized
    #[error("Failed to decode result: {0}")]
    Decode(String),
}

impl CodecError {
    pub fn invalid_invocation(msg: impl Into<String>) -> Self {
        Self::InvalidInvocation(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

/// Port for the invocation serialization mechanism
///
/// `Output` must be `Clone` because result handles replay the same value on
/// every `result()` call.
pub trait InvocationCodec: Send + Sync + 'static {
    type Invocation;
    type Output: Clone + Send + Sync + 'static;

    /// Serialize an invocation into its blob
    fn encode(&self, invocation: &Self::Invocation) -> Result<Bytes, CodecError>;

    /// Deserialize a result blob
    fn decode(&self, bytes: &[u8]) -> Result<Self::Output, CodecError>;
}

/// JSON codec for [`Invocation`] values
///
/// Results are decoded into `O`, e.g. `String` or `serde_json::Value`.
pub struct JsonCodec<O> {
    _output: PhantomData<fn() -> O>,
}

impl<O> JsonCodec<O> {
    pub fn new() -> Self {
        Self {
            _output: PhantomData,
        }
    }
}

impl<O> JsonCodec<O>
where
    O: Serialize,
{
    /// Read a staged invocation blob, as the remote executor does
    pub fn decode_invocation(&self, bytes: &[u8]) -> Result<Invocation, CodecError> {
        let invocation: Invocation =
            serde_json::from_slice(bytes).map_err(|err| CodecError::decode(err.to_string()))?;
        if invocation.function().trim().is_empty() {
            return Err(CodecError::invalid_invocation("function name is empty"));
        }
        Ok(invocation)
    }

    /// Serialize a return value into the result blob `decode` reads back
    pub fn encode_output(&self, output: &O) -> Result<Bytes, CodecError> {
        serde_json::to_vec(output)
            .map(Bytes::from)
            .map_err(|err| CodecError::encode(err.to_string()))
    }
}

impl<O> Default for JsonCodec<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> Clone for JsonCodec<O> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<O> fmt::Debug for JsonCodec<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec").finish()
    }
}

impl<O> InvocationCodec for JsonCodec<O>
where
    O: DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Invocation = Invocation;
    type Output = O;

    fn encode(&self, invocation: &Invocation) -> Result<Bytes, CodecError> {
        serde_json::to_vec(invocation)
            .map(Bytes::from)
            .map_err(|err| CodecError::encode(err.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<O, CodecError> {
        serde_json::from_slice(bytes).map_err(|err| CodecError::decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_is_deterministic() {
        let codec = JsonCodec::<String>::new();
        let invocation = Invocation::new("hello", vec![json!("world")]).unwrap();

        assert_eq!(
            codec.encode(&invocation).unwrap(),
            codec.encode(&invocation.clone()).unwrap()
        );
    }

    #[test]
    fn test_decode_result_value() {
        let codec = JsonCodec::<String>::new();
        assert_eq!(codec.decode(br#""hello world""#).unwrap(), "hello world");
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let codec = JsonCodec::<u32>::new();
        let err = codec.decode(b"not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_remote_side_reads_what_the_client_writes() {
        let client = JsonCodec::<String>::new();
        let invocation = Invocation::new("hello", vec![json!("world")])
            .unwrap()
            .with_kwarg("greeting", json!("hi"));

        let remote = JsonCodec::<String>::new();
        let staged = remote
            .decode_invocation(&client.encode(&invocation).unwrap())
            .unwrap();
        assert_eq!(staged, invocation);

        let result = remote.encode_output(&"hi world".to_string()).unwrap();
        assert_eq!(client.decode(&result).unwrap(), "hi world");
    }

    #[test]
    fn test_staged_invocation_needs_a_function() {
        let err = JsonCodec::<String>::new()
            .decode_invocation(br#"{"function": " ", "args": [], "kwargs": {}}"#)
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidInvocation(_)));
    }
}
