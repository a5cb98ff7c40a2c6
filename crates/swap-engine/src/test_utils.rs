//! Devnet fixtures shared by unit and integration tests.
//!
//! Available with the `test-utils` feature. Two EVM devnets and one regtest
//! node run off a single manual clock, so tests move every ledger through
//! time together.

use crate::adapters::evm::abi::{format_address, EvmAddress};
use crate::adapters::{
    BitcoinAdapter, BitcoinConfig, DevnetEvm, EvmAdapter, EvmConfig, FixedRatePricing,
    InMemoryKVStore, ManualTimeSource, RegtestBitcoin,
};
use crate::domain::{ChainId, SwapConfig};
use crate::ports::{ChainAdapter, KeyValueStore};
use crate::registry::AdapterRegistry;
use crate::service::{SwapCoordinator, SwapDependencies};
use crate::store::OrderStore;
use bitcoin::{Amount, Network};
use std::collections::HashMap;
use std::sync::Arc;
use swap_crypto::Secp256k1KeyPair;

/// Start time of every fixture ledger.
pub const GENESIS_TIME: u64 = 1_700_000_000;

/// EVM chain id of the `ethereum` devnet.
pub const ETHEREUM_CHAIN_ID: u64 = 1337;

/// EVM chain id of the `polygon` devnet.
pub const POLYGON_CHAIN_ID: u64 = 80_002;

/// Native-asset HTLC contract on both devnets.
pub const HTLC_CONTRACT: EvmAddress = [0xcc; 20];

/// ERC-20 HTLC contract on both devnets.
pub const ERC20_HTLC_CONTRACT: EvmAddress = [0xcd; 20];

/// USDC token contract on both devnets.
pub const USDC: EvmAddress = [0x0c; 20];

/// Coordinator account on both devnets.
pub const COORDINATOR_EVM: EvmAddress = [0x01; 20];

/// Coordinator signing key on the regtest node.
pub const COORDINATOR_BTC_SEED: u8 = 0x11;

/// Native and USDC float of the coordinator on each devnet.
pub const COORDINATOR_FLOAT: u128 = 1_000_000_000_000_000_000_000;

/// Regtest wallet balance at genesis (10 BTC).
pub const WALLET_SATS: u64 = 1_000_000_000;

/// Ledgers, adapters and registry for one test.
pub struct Devnet {
    /// Clock shared by every ledger and the store.
    pub clock: Arc<ManualTimeSource>,
    /// `ethereum` ledger.
    pub ethereum: Arc<DevnetEvm>,
    /// `polygon` ledger.
    pub polygon: Arc<DevnetEvm>,
    /// `bitcoin` ledger.
    pub bitcoin: Arc<RegtestBitcoin>,
    /// Adapter for `bitcoin`, for key imports.
    pub bitcoin_adapter: Arc<BitcoinAdapter>,
    /// Registry holding all three adapters.
    pub registry: Arc<AdapterRegistry>,
}

fn evm_ledger(evm_chain_id: u64, clock: &Arc<ManualTimeSource>) -> Arc<DevnetEvm> {
    let devnet = Arc::new(DevnetEvm::new(evm_chain_id, clock.clone()));
    devnet.deploy_htlc_contract(HTLC_CONTRACT);
    devnet.deploy_htlc_contract(ERC20_HTLC_CONTRACT);
    devnet.deploy_token(USDC);
    devnet.mint(COORDINATOR_EVM, COORDINATOR_FLOAT);
    devnet.mint_token(USDC, COORDINATOR_EVM, COORDINATOR_FLOAT);
    devnet
}

fn evm_adapter(
    name: &str,
    evm_chain_id: u64,
    native_token: &str,
    devnet: &Arc<DevnetEvm>,
) -> Arc<EvmAdapter> {
    let config = EvmConfig {
        chain_id: ChainId::new(name),
        evm_chain_id,
        native_token: native_token.to_string(),
        htlc_contract: HTLC_CONTRACT,
        erc20_htlc_contract: Some(ERC20_HTLC_CONTRACT),
        tokens: HashMap::from([("USDC".to_string(), USDC)]),
        account: COORDINATOR_EVM,
    };
    Arc::new(EvmAdapter::new(config, devnet.clone()))
}

fn bitcoin_adapter(bitcoin: &Arc<RegtestBitcoin>) -> Arc<BitcoinAdapter> {
    Arc::new(BitcoinAdapter::new(
        BitcoinConfig::regtest("bitcoin"),
        bitcoin.clone(),
        Devnet::key(COORDINATOR_BTC_SEED),
    ))
}

fn registry_of(adapters: [Arc<dyn ChainAdapter>; 3]) -> Arc<AdapterRegistry> {
    let registry = Arc::new(AdapterRegistry::new());
    for adapter in adapters {
        registry
            .register(adapter)
            .expect("fixture chains are distinct");
    }
    registry
}

impl Devnet {
    /// Fresh ledgers at [`GENESIS_TIME`].
    pub fn new() -> Self {
        let clock = Arc::new(ManualTimeSource::new(GENESIS_TIME));
        let ethereum = evm_ledger(ETHEREUM_CHAIN_ID, &clock);
        let polygon = evm_ledger(POLYGON_CHAIN_ID, &clock);
        let bitcoin = Arc::new(RegtestBitcoin::new(Network::Regtest, clock.clone()));
        bitcoin.credit_wallet(Amount::from_sat(WALLET_SATS));

        let bitcoin_adapter = bitcoin_adapter(&bitcoin);
        let adapters: [Arc<dyn ChainAdapter>; 3] = [
            evm_adapter("ethereum", ETHEREUM_CHAIN_ID, "ETH", &ethereum),
            evm_adapter("polygon", POLYGON_CHAIN_ID, "MATIC", &polygon),
            bitcoin_adapter.clone(),
        ];
        let registry = registry_of(adapters);

        Self {
            clock,
            ethereum,
            polygon,
            bitcoin,
            bitcoin_adapter,
            registry,
        }
    }

    /// New adapters over the same ledgers, as a restarted process builds them.
    ///
    /// Nothing the old adapters remember carries over. User keys the restarted
    /// process should hold are passed as `user_seeds`.
    pub fn restarted_registry(&self, user_seeds: &[u8]) -> Arc<AdapterRegistry> {
        let bitcoin = bitcoin_adapter(&self.bitcoin);
        for seed in user_seeds {
            bitcoin.import_key(Self::key(*seed));
        }
        let adapters: [Arc<dyn ChainAdapter>; 3] = [
            evm_adapter("ethereum", ETHEREUM_CHAIN_ID, "ETH", &self.ethereum),
            evm_adapter("polygon", POLYGON_CHAIN_ID, "MATIC", &self.polygon),
            bitcoin,
        ];
        registry_of(adapters)
    }

    /// Deterministic secp256k1 key from a one-byte seed.
    pub fn key(seed: u8) -> Secp256k1KeyPair {
        Secp256k1KeyPair::from_bytes([seed; 32]).expect("non-zero seed is a valid scalar")
    }

    /// Deterministic EVM address from a one-byte seed.
    pub fn evm_address(seed: u8) -> EvmAddress {
        [seed; 20]
    }

    /// `0x`-prefixed form of [`Devnet::evm_address`].
    pub fn evm_user(seed: u8) -> String {
        format_address(&Self::evm_address(seed))
    }

    /// Register a user key with the regtest adapter and return its pubkey hex.
    pub fn bitcoin_user(&self, seed: u8) -> String {
        self.bitcoin_adapter.import_key(Self::key(seed)).to_hex()
    }

    /// Rates between the two account ledgers: 1 ETH buys 2000 MATIC, USDC 1:1.
    pub fn pricing() -> FixedRatePricing {
        FixedRatePricing::new([ChainId::new("ethereum"), ChainId::new("polygon")])
            .with_rate("ETH", "MATIC", 2000, 1)
            .with_rate("MATIC", "ETH", 1, 2000)
    }

    /// Coordinator over an in-memory store with default config.
    pub fn coordinator(&self) -> SwapCoordinator<InMemoryKVStore> {
        self.coordinator_with(InMemoryKVStore::new(), SwapConfig::default())
    }

    /// Coordinator over `kv` with `config`.
    pub fn coordinator_with<KV: KeyValueStore>(
        &self,
        kv: KV,
        config: SwapConfig,
    ) -> SwapCoordinator<KV> {
        let store = Arc::new(OrderStore::new(kv, self.clock.clone()));
        Self::coordinator_over(self.registry.clone(), store, config)
    }

    /// Coordinator over an existing registry and store.
    pub fn coordinator_over<KV: KeyValueStore>(
        registry: Arc<AdapterRegistry>,
        store: Arc<OrderStore<KV>>,
        config: SwapConfig,
    ) -> SwapCoordinator<KV> {
        SwapCoordinator::new(
            SwapDependencies {
                registry,
                store,
                pricing: Some(Arc::new(Self::pricing())),
            },
            config,
        )
    }
}

impl Default for Devnet {
    fn default() -> Self {
        Self::new()
    }
}
