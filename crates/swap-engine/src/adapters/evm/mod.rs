//! # EVM Ledger Adapter
//!
//! Drives a hashed-timelock contract on an account-based chain.
//!
//! - `abi`: calldata encoding and the contract id derivation
//! - `rpc`: the ledger access port
//! - `devnet`: in-process ledger implementing the port
//! - `adapter`: the [`ChainAdapter`](crate::ports::ChainAdapter) implementation

pub mod abi;
mod adapter;
mod devnet;
mod rpc;

pub use adapter::{EvmAdapter, EvmConfig};
pub use devnet::DevnetEvm;
pub use rpc::{ContractView, EvmRpc, EvmTransaction};
