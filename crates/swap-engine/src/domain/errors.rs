//! # Domain Errors
//!
//! One taxonomy for every caller-facing operation. Validation and not-found
//! errors are raised before any state is touched; adapter errors raised while
//! executing a swap are also recorded on the swap itself.

use swap_crypto::CryptoError;
use thiserror::Error;

/// Swap engine error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwapError {
    /// Missing or malformed request fields.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown order, swap, HTLC or chain.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Preimage does not hash to the stored hashlock.
    #[error("Invalid secret")]
    InvalidSecret,

    /// Refund before expiry, or an action that expiry forecloses.
    #[error("Invalid time: {0}")]
    InvalidTime(String),

    /// Ledger communication or broadcast failure.
    #[error("Adapter error on {chain}: {message}")]
    Adapter {
        /// Chain the failing adapter serves
        chain: String,
        /// Underlying failure
        message: String,
    },

    /// Operation not permitted from the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Order store backend failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl SwapError {
    /// Build an adapter error for `chain`.
    pub fn adapter(chain: impl Into<String>, message: impl Into<String>) -> Self {
        SwapError::Adapter {
            chain: chain.into(),
            message: message.into(),
        }
    }

    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SwapError::Validation(message.into())
    }
}

impl From<CryptoError> for SwapError {
    fn from(err: CryptoError) -> Self {
        SwapError::Validation(err.to_string())
    }
}
