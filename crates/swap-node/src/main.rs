//! # Swap Node
//!
//! Entry point: logging, configuration, runtime, then wait for Ctrl+C.
//!
//! Log levels come from `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use std::sync::Arc;
use swap_engine::adapters::{InMemoryKVStore, SystemTimeSource};
use swap_engine::{KeyValueStore, TimeSource};
use swap_node::{NodeConfig, NodeRuntime, StorageBackend};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

async fn run<KV: KeyValueStore + 'static>(runtime: NodeRuntime<KV>) -> Result<()> {
    runtime.start().await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}

#[cfg(feature = "rocksdb")]
async fn run_rocksdb(config: NodeConfig, clock: Arc<dyn TimeSource>) -> Result<()> {
    use swap_engine::adapters::{RocksDbConfig, RocksDbStore};

    let path = config.storage.data_dir.to_string_lossy().into_owned();
    let store = RocksDbStore::open(RocksDbConfig {
        path: path.clone(),
        ..RocksDbConfig::default()
    })
    .with_context(|| format!("Failed to open RocksDB at {}", path))?;
    run(NodeRuntime::new(config, store, clock)?).await
}

#[cfg(not(feature = "rocksdb"))]
async fn run_rocksdb(_config: NodeConfig, _clock: Arc<dyn TimeSource>) -> Result<()> {
    anyhow::bail!("HX_STORAGE=rocksdb requires a build with the `rocksdb` feature")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);

    match config.storage.backend {
        StorageBackend::Memory => {
            run(NodeRuntime::new(config, InMemoryKVStore::new(), clock)?).await
        }
        StorageBackend::RocksDb => run_rocksdb(config, clock).await,
    }
}
