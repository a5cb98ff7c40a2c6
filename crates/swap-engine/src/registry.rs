//! Chain identifier to adapter mapping.
//!
//! Built explicitly at startup, handed to the coordinator, and torn down
//! with [`AdapterRegistry::shutdown`].

use crate::domain::{ChainId, SwapError};
use crate::ports::ChainAdapter;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Registry of chain adapters.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<ChainId, Arc<dyn ChainAdapter>>>,
}

impl AdapterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own chain id.
    pub fn register(&self, adapter: Arc<dyn ChainAdapter>) -> Result<(), SwapError> {
        let chain = adapter.chain_id().clone();
        let mut adapters = self.adapters.write();
        if adapters.contains_key(&chain) {
            return Err(SwapError::validation(format!(
                "adapter for {} already registered",
                chain
            )));
        }
        info!("[swap] Registered {:?} adapter for {}", adapter.family(), chain);
        adapters.insert(chain, adapter);
        Ok(())
    }

    /// Adapter for `chain`.
    pub fn get(&self, chain: &ChainId) -> Result<Arc<dyn ChainAdapter>, SwapError> {
        self.adapters
            .read()
            .get(chain)
            .cloned()
            .ok_or_else(|| SwapError::NotFound(format!("no adapter for chain {}", chain)))
    }

    /// Whether `chain` has an adapter.
    pub fn contains(&self, chain: &ChainId) -> bool {
        self.adapters.read().contains_key(chain)
    }

    /// Registered chains, sorted.
    pub fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<_> = self.adapters.read().keys().cloned().collect();
        chains.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        chains
    }

    /// Initialize every adapter, stopping at the first failure.
    pub async fn initialize_all(&self) -> Result<(), SwapError> {
        let adapters: Vec<_> = self.adapters.read().values().cloned().collect();
        for adapter in adapters {
            adapter.initialize().await?;
        }
        Ok(())
    }

    /// Drop every adapter. Later lookups fail with `NotFound`.
    pub fn shutdown(&self) {
        let mut adapters = self.adapters.write();
        let count = adapters.len();
        adapters.clear();
        info!("[swap] Adapter registry shut down ({} adapters released)", count);
    }
}
