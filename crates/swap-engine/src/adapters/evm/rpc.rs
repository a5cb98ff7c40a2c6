//! Ledger access port for EVM chains.

use super::abi::{EvmAddress, Word};
use crate::domain::SwapError;
use async_trait::async_trait;

/// A call to submit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvmTransaction {
    /// Signing account.
    pub from: EvmAddress,
    /// Target contract.
    pub to: EvmAddress,
    /// Native value attached.
    pub value: u128,
    /// Calldata.
    pub data: Vec<u8>,
}

/// `getContract(id)` view of a hashed-timelock entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractView {
    /// Locking account.
    pub sender: EvmAddress,
    /// Redeeming account.
    pub receiver: EvmAddress,
    /// ERC-20 token, `None` for native value.
    pub token: Option<EvmAddress>,
    /// Locked amount.
    pub amount: u128,
    /// SHA-256 hashlock.
    pub hashlock: Word,
    /// Unix-seconds expiry.
    pub timelock: u64,
    /// Redeemed.
    pub withdrawn: bool,
    /// Refunded.
    pub refunded: bool,
    /// Preimage, once withdrawn.
    pub preimage: Option<Word>,
}

/// JSON-RPC surface the adapter needs.
#[async_trait]
pub trait EvmRpc: Send + Sync {
    /// `eth_chainId`
    async fn chain_id(&self) -> Result<u64, SwapError>;

    /// Timestamp of the latest block.
    async fn block_timestamp(&self) -> Result<u64, SwapError>;

    /// Native balance, or ERC-20 balance when `token` is given.
    async fn balance(&self, owner: &EvmAddress, token: Option<&EvmAddress>)
        -> Result<u128, SwapError>;

    /// Submit and mine a transaction, returning its hash. Reverts are errors.
    async fn send_transaction(&self, tx: EvmTransaction) -> Result<String, SwapError>;

    /// Read a contract entry.
    async fn get_contract(
        &self,
        contract: &EvmAddress,
        id: &Word,
    ) -> Result<Option<ContractView>, SwapError>;
}
