//! # Bitcoin Ledger Adapter
//!
//! P2SH hashed-timelock outputs on a script-based UTXO chain.
//!
//! - `rpc`: the node access port
//! - `regtest`: in-process node implementing the port
//! - `adapter`: the [`ChainAdapter`](crate::ports::ChainAdapter) implementation

mod adapter;
mod regtest;
mod rpc;

pub use adapter::{BitcoinAdapter, BitcoinConfig, DEFAULT_FEE_SATS};
pub use regtest::RegtestBitcoin;
pub use rpc::BitcoinRpc;
