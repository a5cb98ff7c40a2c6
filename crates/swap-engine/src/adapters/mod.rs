//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound ports: ledgers, storage, pricing and time.

pub mod bitcoin;
pub mod clock;
pub mod evm;
pub mod pricing;
pub mod storage;

pub use self::bitcoin::{BitcoinAdapter, BitcoinConfig, BitcoinRpc, RegtestBitcoin};
pub use clock::{ManualTimeSource, SystemTimeSource};
pub use evm::{DevnetEvm, EvmAdapter, EvmConfig, EvmRpc};
pub use pricing::{FixedRatePricing, DEFAULT_GAS_ESTIMATE, DEFAULT_SLIPPAGE_BPS};
pub use storage::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use storage::{RocksDbConfig, RocksDbStore};
