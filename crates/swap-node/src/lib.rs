//! # Swap Node Runtime
//!
//! Hosts the swap coordinator. The main entry point is the `main.rs` binary;
//! this library exposes the runtime for testing.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults + `HX_*` environment)
//! 2. Build the adapter registry and pricing
//! 3. Initialize every adapter
//! 4. Start the expiry sweeper
//!
//! ## Shutdown Sequence
//!
//! 1. Signal the sweeper to stop
//! 2. Tear down the adapter registry

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod wiring;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use swap_engine::{
    KeyValueStore, OrderStore, SwapCoordinator, SwapDependencies, SwapError, TimeSource,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

pub use config::{ConfigError, NodeConfig, StorageBackend};
pub use wiring::{build_devnet_registry, build_pricing, DevnetLedgers};

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Swaps moved to `Expired`.
    pub swaps: usize,
    /// Orders moved to `Expired`.
    pub orders: usize,
}

/// Expire stale swaps, then stale orders.
pub async fn sweep<KV: KeyValueStore>(
    coordinator: &SwapCoordinator<KV>,
) -> Result<SweepReport, SwapError> {
    let swaps = coordinator.expire_stale_swaps().await?;
    let orders = coordinator.store().cleanup_expired_orders()?;
    Ok(SweepReport { swaps, orders })
}

/// The node runtime.
pub struct NodeRuntime<KV: KeyValueStore + 'static> {
    config: NodeConfig,
    ledgers: DevnetLedgers,
    coordinator: Arc<SwapCoordinator<KV>>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl<KV: KeyValueStore + 'static> NodeRuntime<KV> {
    /// Create a runtime over `kv`, with every ledger on `clock`.
    pub fn new(config: NodeConfig, kv: KV, clock: Arc<dyn TimeSource>) -> Result<Self> {
        info!("Creating swap node runtime");
        let ledgers = build_devnet_registry(&config, clock.clone())
            .context("Failed to build adapter registry")?;
        let store = Arc::new(OrderStore::new(kv, clock));
        let coordinator = Arc::new(SwapCoordinator::new(
            SwapDependencies {
                registry: ledgers.registry.clone(),
                store,
                pricing: Some(Arc::new(build_pricing(&config))),
            },
            config.swap.clone(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            ledgers,
            coordinator,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Initialize adapters and start the sweeper.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Swap Node v{}", swap_engine::VERSION);
        info!("===========================================");

        self.ledgers
            .registry
            .initialize_all()
            .await
            .context("Failed to initialize chain adapters")?;
        self.spawn_sweeper();

        info!("Chains: {:?}", self.ledgers.registry.chains());
        info!("Storage: {:?}", self.config.storage.backend);
        info!("Sweep interval: {}s", self.config.sweeper.interval_secs);
        Ok(())
    }

    fn spawn_sweeper(&self) {
        let coordinator = Arc::clone(&self.coordinator);
        let mut shutdown = self.shutdown_rx.clone();
        let period = Duration::from_secs(self.config.sweeper.interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => match sweep(&coordinator).await {
                        Ok(report) if report != SweepReport::default() => {
                            info!(
                                "[swap] Sweep expired {} swaps, {} orders",
                                report.swaps, report.orders
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!("[swap] Sweep failed: {}", e),
                    },
                    _ = shutdown.changed() => {
                        info!("[swap] Sweeper stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Shutdown the node gracefully.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        tokio::task::yield_now().await;
        self.ledgers.registry.shutdown();
        info!("Shutdown complete");
    }

    /// The coordinator.
    pub fn coordinator(&self) -> Arc<SwapCoordinator<KV>> {
        Arc::clone(&self.coordinator)
    }

    /// Devnet ledgers behind the registry.
    pub fn ledgers(&self) -> &DevnetLedgers {
        &self.ledgers
    }
}
