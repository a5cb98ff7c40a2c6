//! Ledger access port for Bitcoin-family chains.

use crate::algorithms::FundingUtxo;
use crate::domain::SwapError;
use async_trait::async_trait;
use bitcoin::{Address, Amount, OutPoint, Transaction, TxOut, Txid};

/// Node RPC surface the adapter needs.
#[async_trait]
pub trait BitcoinRpc: Send + Sync {
    /// Median time past of the chain tip, the clock CLTV is checked against.
    async fn median_time(&self) -> Result<u64, SwapError>;

    /// Pay `amount` from the node wallet to `address`; returns the new output.
    async fn send_to_address(
        &self,
        address: &Address,
        amount: Amount,
    ) -> Result<FundingUtxo, SwapError>;

    /// Validate and accept a signed transaction.
    async fn broadcast(&self, tx: &Transaction) -> Result<Txid, SwapError>;

    /// Sum of unspent outputs paying `address`.
    async fn balance(&self, address: &Address) -> Result<Amount, SwapError>;

    /// Unspent output at `outpoint`, if any.
    async fn get_txout(&self, outpoint: &OutPoint) -> Result<Option<TxOut>, SwapError>;

    /// Transaction that spent `outpoint`, if known.
    async fn spending_transaction(
        &self,
        outpoint: &OutPoint,
    ) -> Result<Option<Transaction>, SwapError>;
}
