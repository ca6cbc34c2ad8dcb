//! Offload `hello("world")` to a TES server
//!
//! ```bash
//! export FARCALL_STORAGE_URL=s3://farcall-demo/runs
//! export FARCALL_TES_URL=http://localhost:8000
//! cargo run -p farcall-tes --example hello
//! ```
//!
//! Running it twice prints the cached result the second time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use farcall_domain::{Invocation, InvocationBuilder, JsonCodec, ResourceRequest};
use farcall_store::{FileStore, StorageOptions};
use farcall_tes::TesClient;
use serde_json::json;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,farcall=debug".into()),
        )
        .init();

    let storage_url = std::env::var("FARCALL_STORAGE_URL").unwrap_or_else(|_| {
        info!("FARCALL_STORAGE_URL not set, using default: ./farcall-store");
        "./farcall-store".to_string()
    });

    let store = Arc::new(FileStore::connect(&storage_url, StorageOptions::from_env()).await?);
    let tes = Arc::new(TesClient::from_env()?);

    let mut builder = InvocationBuilder::new(store, tes);
    builder
        .with_resources(ResourceRequest::new().cpu_cores(1).ram_gb(0.5))
        .with_call_caching("hello_demo")?
        .with_output("./greeting.txt")?;

    let invocation = Invocation::new("hello", vec![json!("world")])?;
    let handle = builder
        .run(Arc::new(JsonCodec::<String>::new()), &invocation)
        .await?;

    info!(cached = handle.is_cached(), result_url = %handle.result_url(), "Call staged");
    let greeting = handle.result(Some(Duration::from_secs(600))).await?;
    println!("{}", greeting);

    Ok(())
}
