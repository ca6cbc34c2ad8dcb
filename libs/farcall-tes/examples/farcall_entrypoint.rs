//! In-container entrypoint for the `hello` demo
//!
//! The runner script execs this program as
//! `farcall-entrypoint <invocation blob> <result blob>`. Build it into the
//! task image and point `ExecutorConfig::entrypoint` (or `FARCALL_ENTRYPOINT`)
//! at it:
//!
//! ```bash
//! cargo build --release -p farcall-tes --example farcall-entrypoint
//! ```
//!
//! A non-zero exit marks the task as failed, so no result is uploaded.

use std::path::PathBuf;

use anyhow::{bail, Result};
use farcall_domain::{entrypoint, FunctionRegistry};
use serde_json::{json, Value};

fn registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry
        .register("hello", |invocation| {
            let name = invocation
                .args()
                .first()
                .and_then(Value::as_str)
                .ok_or("hello takes a name")?;
            Ok(json!(format!("hello {}", name)))
        })
        .register("add", |invocation| {
            Ok(json!(invocation
                .args()
                .iter()
                .filter_map(Value::as_i64)
                .sum::<i64>()))
        });
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,farcall=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let (Some(invocation), Some(result)) = (args.next(), args.next()) else {
        bail!("usage: farcall-entrypoint <invocation blob> <result blob>");
    };

    entrypoint::run(&registry(), &invocation, &result).await?;
    Ok(())
}
