//! Remote side of a call
//!
//! `run` is what the runner script execs inside the task container: it reads
//! the staged invocation, dispatches it to a function registered under
//! `Invocation::function`, and writes the JSON-encoded return value to the
//! result path the task backend collects.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut registry = FunctionRegistry::new();
//! registry.register("hello", |invocation| {
//!     let name = invocation.args().first().and_then(Value::as_str).unwrap_or("nobody");
//!     Ok(json!(format!("hello {}", name)))
//! });
//! entrypoint::run(&registry, Path::new("invocation.bin"), Path::new("result.bin")).await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::invocation::{CodecError, Invocation, JsonCodec};

/// A function callable by name from a staged invocation
pub type RemoteFunction = Box<dyn Fn(&Invocation) -> Result<Value, String> + Send + Sync>;

/// Errors raised while executing a staged invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntrypointError {
    #[error("Failed to read invocation '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("No function registered as '{0}'")]
    UnknownFunction(String),

    #[error("Function '{function}' failed: {reason}")]
    Failed { function: String, reason: String },

    #[error("Failed to write result '{path}': {reason}")]
    Write { path: String, reason: String },
}

/// Functions the entrypoint can dispatch to
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, RemoteFunction>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&Invocation) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Box::new(function));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Call the function `invocation` names
    ///
    /// # Errors
    ///
    /// - `EntrypointError::UnknownFunction` if nothing is registered under the name
    /// - `EntrypointError::Failed` if the function returns an error
    pub fn call(&self, invocation: &Invocation) -> Result<Value, EntrypointError> {
        let name = invocation.function();
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| EntrypointError::UnknownFunction(name.to_string()))?;

        function(invocation).map_err(|reason| EntrypointError::Failed {
            function: name.to_string(),
            reason,
        })
    }
}

/// Execute the invocation staged at `invocation_path`
///
/// Nothing is written to `result_path` unless the call succeeds, so a failed
/// call never leaves a result behind for the cache to find.
#[instrument(skip(registry), fields(invocation = %invocation_path.display()))]
pub async fn run(
    registry: &FunctionRegistry,
    invocation_path: &Path,
    result_path: &Path,
) -> Result<(), EntrypointError> {
    let codec = JsonCodec::<Value>::new();

    let blob = tokio::fs::read(invocation_path)
        .await
        .map_err(|err| EntrypointError::Read {
            path: invocation_path.display().to_string(),
            reason: err.to_string(),
        })?;
    let invocation = codec.decode_invocation(&blob)?;
    debug!(function = %invocation.function(), args = invocation.args().len(), "Dispatching invocation");

    let value = registry.call(&invocation)?;
    let encoded = codec.encode_output(&value)?;

    let write_error = |err: std::io::Error| EntrypointError::Write {
        path: result_path.display().to_string(),
        reason: err.to_string(),
    };
    if let Some(parent) = result_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(result_path, &encoded)
        .await
        .map_err(write_error)?;

    info!(function = %invocation.function(), result = %result_path.display(), "Invocation complete");
    Ok(())
}
