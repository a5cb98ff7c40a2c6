//! # Node Configuration
//!
//! Runtime configuration with defaults for a local devnet, overridable from
//! `HX_*` environment variables.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `HX_STORAGE` | `storage.backend` (`memory` or `rocksdb`) |
//! | `HX_DATA_DIR` | `storage.data_dir` |
//! | `HX_SWEEP_INTERVAL_SECS` | `sweeper.interval_secs` |
//! | `HX_DEFAULT_TIMELOCK_SECS` | `swap.default_timelock_secs` |
//! | `HX_FEE_BPS` | `swap.fee_bps` |
//! | `HX_SLIPPAGE_BPS` | `pricing.slippage_bps` |
//! | `HX_POLYGON_CHAIN_ID` | `polygon.evm_chain_id` |
//! | `HX_EVM_CHAIN_ID` | `ethereum.evm_chain_id` |
//! | `HX_HTLC_CONTRACT` | `ethereum.htlc_contract` |
//! | `HX_EVM_ACCOUNT` | `ethereum.account` |
//! | `HX_BTC_NETWORK` | `bitcoin.network` |
//! | `HX_BTC_FEE_SATS` | `bitcoin.fee_sats` |
//! | `HX_BTC_KEY` | `bitcoin.signing_key` (hex secp256k1 secret) |

use bitcoin::Network;
use std::path::PathBuf;
use std::str::FromStr;
use swap_engine::adapters::bitcoin::DEFAULT_FEE_SATS;
use swap_engine::adapters::evm::abi::{parse_address, EvmAddress};
use swap_engine::adapters::{DEFAULT_GAS_ESTIMATE, DEFAULT_SLIPPAGE_BPS};
use swap_engine::{SwapConfig, BPS_DENOMINATOR, MAX_FEE_BPS};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment override could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },
    /// Values parse but contradict each other.
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Order store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Lost on exit.
    Memory,
    /// RocksDB under `data_dir`; needs the `rocksdb` feature.
    RocksDb,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" => Ok(Self::RocksDb),
            _ => Err(()),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backend holding orders and swap records.
    pub backend: StorageBackend,
    /// Data directory for durable backends.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("./data/swaps"),
        }
    }
}

/// Expiry sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Seconds between sweeps.
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

/// Account-based ledger settings.
#[derive(Debug, Clone)]
pub struct EvmChainConfig {
    /// Registry name.
    pub name: String,
    /// Chain id the node must report.
    pub evm_chain_id: u64,
    /// Native asset symbol.
    pub native_token: String,
    /// Native-asset HTLC contract.
    pub htlc_contract: EvmAddress,
    /// ERC-20 HTLC contract.
    pub erc20_htlc_contract: Option<EvmAddress>,
    /// Supported ERC-20 tokens, symbol to contract.
    pub tokens: Vec<(String, EvmAddress)>,
    /// Coordinator account.
    pub account: EvmAddress,
    /// Devnet balance credited to the coordinator at startup.
    pub devnet_float: u128,
}

impl Default for EvmChainConfig {
    fn default() -> Self {
        Self {
            name: "ethereum".to_string(),
            evm_chain_id: 1337,
            native_token: "ETH".to_string(),
            htlc_contract: [0xcc; 20],
            erc20_htlc_contract: Some([0xcd; 20]),
            tokens: vec![("USDC".to_string(), [0x0c; 20])],
            account: [0x01; 20],
            devnet_float: 1_000_000_000_000_000_000_000,
        }
    }
}

impl EvmChainConfig {
    /// Second account ledger of the devnet.
    pub fn polygon() -> Self {
        Self {
            name: "polygon".to_string(),
            evm_chain_id: 80_002,
            native_token: "MATIC".to_string(),
            ..Self::default()
        }
    }
}

/// One directed exchange rate: `to = from * numerator / denominator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateConfig {
    /// Source token symbol.
    pub from: String,
    /// Destination token symbol.
    pub to: String,
    /// Rate numerator in base units.
    pub numerator: u128,
    /// Rate denominator in base units.
    pub denominator: u128,
}

impl RateConfig {
    fn new(from: &str, to: &str, numerator: u128, denominator: u128) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            numerator,
            denominator,
        }
    }
}

/// Quotes between the account ledgers.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Slippage withheld from every quote.
    pub slippage_bps: u32,
    /// Gas reported for a contract-chain lock.
    pub gas_estimate: u64,
    /// Directed rates; same-token pairs trade 1:1 without one.
    pub rates: Vec<RateConfig>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            gas_estimate: DEFAULT_GAS_ESTIMATE,
            rates: vec![
                RateConfig::new("ETH", "MATIC", 2000, 1),
                RateConfig::new("MATIC", "ETH", 1, 2000),
            ],
        }
    }
}

/// Script-based ledger settings.
#[derive(Debug, Clone)]
pub struct BitcoinChainConfig {
    /// Registry name.
    pub name: String,
    /// Address network.
    pub network: Network,
    /// Flat fee per HTLC spend.
    pub fee_sats: u64,
    /// Hex secp256k1 secret of the coordinator; random when absent.
    pub signing_key: Option<String>,
    /// Devnet wallet balance at startup.
    pub devnet_wallet_sats: u64,
}

impl Default for BitcoinChainConfig {
    fn default() -> Self {
        Self {
            name: "bitcoin".to_string(),
            network: Network::Regtest,
            fee_sats: DEFAULT_FEE_SATS,
            signing_key: None,
            devnet_wallet_sats: 1_000_000_000,
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Sweeper configuration.
    pub sweeper: SweeperConfig,
    /// Coordinator configuration.
    pub swap: SwapConfig,
    /// Account-based ledger.
    pub ethereum: EvmChainConfig,
    /// Optional second account-based ledger.
    pub polygon: Option<EvmChainConfig>,
    /// Script-based ledger.
    pub bitcoin: BitcoinChainConfig,
    /// Pricing between the account ledgers.
    pub pricing: PricingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            sweeper: SweeperConfig::default(),
            swap: SwapConfig::default(),
            ethereum: EvmChainConfig::default(),
            polygon: Some(EvmChainConfig::polygon()),
            bitcoin: BitcoinChainConfig::default(),
            pricing: PricingConfig::default(),
        }
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw.clone() })?;
    }
    Ok(())
}

fn override_address(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    target: &mut EvmAddress,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *target = parse_address(raw.trim()).map_err(|_| ConfigError::Invalid { key, value: raw })?;
    }
    Ok(())
}

impl NodeConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        override_parsed(&lookup, "HX_STORAGE", &mut config.storage.backend)?;
        if let Some(dir) = lookup("HX_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        override_parsed(&lookup, "HX_SWEEP_INTERVAL_SECS", &mut config.sweeper.interval_secs)?;
        override_parsed(
            &lookup,
            "HX_DEFAULT_TIMELOCK_SECS",
            &mut config.swap.default_timelock_secs,
        )?;
        override_parsed(&lookup, "HX_FEE_BPS", &mut config.swap.fee_bps)?;
        override_parsed(&lookup, "HX_SLIPPAGE_BPS", &mut config.pricing.slippage_bps)?;
        override_parsed(&lookup, "HX_EVM_CHAIN_ID", &mut config.ethereum.evm_chain_id)?;
        if let Some(polygon) = config.polygon.as_mut() {
            override_parsed(&lookup, "HX_POLYGON_CHAIN_ID", &mut polygon.evm_chain_id)?;
        }
        override_address(&lookup, "HX_HTLC_CONTRACT", &mut config.ethereum.htlc_contract)?;
        override_address(&lookup, "HX_EVM_ACCOUNT", &mut config.ethereum.account)?;
        override_parsed(&lookup, "HX_BTC_NETWORK", &mut config.bitcoin.network)?;
        override_parsed(&lookup, "HX_BTC_FEE_SATS", &mut config.bitcoin.fee_sats)?;
        if let Some(key) = lookup("HX_BTC_KEY") {
            config.bitcoin.signing_key = Some(key.trim().to_string());
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that parse individually but not together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweeper.interval_secs == 0 {
            return Err(ConfigError::Inconsistent(
                "sweeper interval must be non-zero".to_string(),
            ));
        }
        let swap = &self.swap;
        if !(swap.min_timelock_secs..=swap.max_timelock_secs).contains(&swap.default_timelock_secs)
        {
            return Err(ConfigError::Inconsistent(format!(
                "default timelock {} outside [{}, {}]",
                swap.default_timelock_secs, swap.min_timelock_secs, swap.max_timelock_secs
            )));
        }
        if swap.fee_bps > MAX_FEE_BPS {
            return Err(ConfigError::Inconsistent(format!(
                "fee {} bps above the {} bps cap",
                swap.fee_bps, MAX_FEE_BPS
            )));
        }
        if u128::from(self.pricing.slippage_bps) >= BPS_DENOMINATOR {
            return Err(ConfigError::Inconsistent(format!(
                "slippage {} bps leaves nothing to quote",
                self.pricing.slippage_bps
            )));
        }
        let degenerate = self
            .pricing
            .rates
            .iter()
            .find(|r| r.numerator == 0 || r.denominator == 0);
        if let Some(rate) = degenerate {
            return Err(ConfigError::Inconsistent(format!(
                "rate {}/{} must be positive",
                rate.from, rate.to
            )));
        }

        let mut names = vec![&self.ethereum.name, &self.bitcoin.name];
        if let Some(polygon) = &self.polygon {
            if polygon.evm_chain_id == self.ethereum.evm_chain_id {
                return Err(ConfigError::Inconsistent(
                    "account ledgers must report distinct chain ids".to_string(),
                ));
            }
            names.push(&polygon.name);
        }
        for (i, name) in names.iter().enumerate() {
            if names[i + 1..].iter().any(|other| other.eq_ignore_ascii_case(name)) {
                return Err(ConfigError::Inconsistent(format!(
                    "chain name {} used twice",
                    name
                )));
            }
        }
        Ok(())
    }
}
