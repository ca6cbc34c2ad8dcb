//! Invocation entity
//!
//! An `Invocation` names a function known to the remote entrypoint and the
//! JSON arguments to call it with. Keyword arguments live in a sorted map so
//! that two equal invocations always serialize to the same bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::invocation::codec::CodecError;

/// A function identity plus its arguments
///
/// # Example
///
/// ```rust
/// use farcall_domain::invocation::Invocation;
/// use serde_json::json;
///
/// let invocation = Invocation::new("hello", vec![json!("world")])
///     .unwrap()
///     .with_kwarg("punctuation", json!("!"));
/// assert_eq!(invocation.function(), "hello");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    function: String,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    kwargs: BTreeMap<String, Value>,
}

impl Invocation {
    /// Create an invocation of `function` with positional arguments
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidInvocation` if the function name is blank.
    pub fn new(function: impl Into<String>, args: Vec<Value>) -> Result<Self, CodecError> {
        let function = function.into();
        if function.trim().is_empty() {
            return Err(CodecError::invalid_invocation("function name cannot be empty"));
        }
        Ok(Self {
            function,
            args,
            kwargs: BTreeMap::new(),
        })
    }

    /// Add a keyword argument, replacing any previous value for `name`
    pub fn with_kwarg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(name.into(), value);
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_function_rejected() {
        let err = Invocation::new("  ", vec![]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidInvocation(_)));
    }

    #[test]
    fn test_kwargs_serialize_in_sorted_order() {
        let a = Invocation::new("f", vec![])
            .unwrap()
            .with_kwarg("zeta", json!(1))
            .with_kwarg("alpha", json!(2));
        let b = Invocation::new("f", vec![])
            .unwrap()
            .with_kwarg("alpha", json!(2))
            .with_kwarg("zeta", json!(1));

        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }
}
