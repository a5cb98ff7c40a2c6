//! # Outbound Ports
//!
//! Traits for external dependencies: ledgers, persistence, pricing and time.

use crate::domain::{
    ChainFamily, ChainId, EscrowDetails, HtlcState, Quote, QuoteRequest, SwapError,
};
use async_trait::async_trait;
use swap_crypto::Hashlock;
use thiserror::Error;

// =============================================================================
// Chain adapters
// =============================================================================

/// Parameters for locking funds in an HTLC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HtlcParams {
    /// SHA-256 of the secret.
    pub hashlock: Hashlock,
    /// Absolute expiry in the ledger's time unit.
    pub timelock: u64,
    /// Party able to redeem; the adapter's own account when `None`.
    pub recipient: Option<String>,
    /// Party locking and able to refund; the adapter's own account when `None`.
    pub sender: Option<String>,
    /// Amount in the token's base unit.
    pub amount: u128,
    /// Token symbol; the native asset when `None`.
    pub token: Option<String>,
}

/// Result of a successful lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HtlcLock {
    /// Adapter-level HTLC id, used for redeem/refund/status.
    pub htlc_id: String,
    /// Lock transaction id.
    pub tx_id: String,
    /// Ledger-specific escrow details.
    pub escrow: EscrowDetails,
}

/// On-ledger view of an HTLC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HtlcStatusReport {
    /// Current state.
    pub status: HtlcState,
    /// Hashlock guarding the redeem branch.
    pub hashlock: Hashlock,
    /// Absolute expiry.
    pub timelock: u64,
    /// Redeeming party.
    pub recipient: String,
    /// Locking and refunding party.
    pub sender: String,
    /// Locked amount.
    pub amount: u128,
    /// When the lock was created.
    pub created_at: u64,
    /// When the refund branch opens.
    pub expires_at: u64,
}

/// Chain adapter - outbound port.
///
/// One implementation per supported ledger. The coordinator only ever talks
/// to ledgers through this capability set.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Ledger served by this adapter.
    fn chain_id(&self) -> &ChainId;

    /// Transaction model of the ledger.
    fn family(&self) -> ChainFamily;

    /// Symbol of the native asset.
    fn native_token(&self) -> &str;

    /// Whether `token` can be locked on this ledger.
    fn supports_token(&self, token: &str) -> bool;

    /// Whether `address` identifies a party on this ledger.
    fn validate_address(&self, address: &str) -> bool;

    /// The coordinator's own party on this ledger.
    fn account(&self) -> String;

    /// Establish connectivity and credentials. Idempotent.
    async fn initialize(&self) -> Result<(), SwapError>;

    /// Lock funds under the hashlock/timelock condition.
    async fn create_htlc(&self, params: HtlcParams) -> Result<HtlcLock, SwapError>;

    /// Make a lock recorded by an earlier process addressable by `htlc_id`.
    ///
    /// Adapters that can find every lock on the ledger itself keep the
    /// default no-op.
    fn track_htlc(&self, _htlc_id: &str, _escrow: &EscrowDetails) -> Result<(), SwapError> {
        Ok(())
    }

    /// Redeem with the preimage, moving funds to the recipient.
    async fn redeem_htlc(&self, htlc_id: &str, preimage: &[u8]) -> Result<String, SwapError>;

    /// Return funds to the sender once the timelock has passed.
    async fn refund_htlc(&self, htlc_id: &str) -> Result<String, SwapError>;

    /// Balance of `address` in the native asset.
    async fn get_balance(&self, address: &str) -> Result<u128, SwapError>;

    /// Current on-ledger view of an HTLC.
    async fn get_htlc_status(&self, htlc_id: &str) -> Result<HtlcStatusReport, SwapError>;

    /// The ledger's notion of now, in the unit timelocks use.
    async fn current_time(&self) -> Result<u64, SwapError>;
}

// =============================================================================
// Persistence
// =============================================================================

/// Key-value store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError {
        /// Backend message
        message: String,
    },
    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError {
        /// What failed to decode
        message: String,
    },
    /// Key not found.
    #[error("Key not found in KV store")]
    NotFound,
}

impl From<KVStoreError> for SwapError {
    fn from(err: KVStoreError) -> Self {
        SwapError::Storage(err.to_string())
    }
}

/// Abstract interface for key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch succeed, or NONE are applied.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// Iterate over keys with a prefix.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Key
        key: Vec<u8>,
    },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

// =============================================================================
// Pricing and time
// =============================================================================

/// Pricing collaborator - outbound port.
#[async_trait]
pub trait PricingService: Send + Sync {
    /// Whether this service prices the given ledger pair.
    fn supports(&self, from: &ChainId, to: &ChainId) -> bool;

    /// Quote `from_amount` for the request's token pair.
    async fn quote(&self, request: &QuoteRequest, from_amount: u128) -> Result<Quote, SwapError>;
}

/// Abstract interface for wall-clock time.
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in seconds since epoch.
    fn now(&self) -> u64;
}
