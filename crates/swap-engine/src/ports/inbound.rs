//! # Inbound Ports
//!
//! API trait defining what the swap engine offers its callers.

use crate::domain::{Quote, QuoteRequest, SwapError, SwapId, SwapRecord, SwapRequest};
use async_trait::async_trait;

/// Swap API - inbound port.
#[async_trait]
pub trait SwapApi: Send + Sync {
    /// Read-only quote for an exchange.
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError>;

    /// Validate a request and record a new swap in `Initiated`.
    async fn initiate_swap(&self, request: SwapRequest) -> Result<SwapRecord, SwapError>;

    /// Lock both legs and redeem the destination.
    async fn execute_swap(&self, swap_id: &SwapId) -> Result<SwapRecord, SwapError>;

    /// Current record of a swap.
    async fn get_swap_status(&self, swap_id: &SwapId) -> Result<SwapRecord, SwapError>;

    /// Refund every locked leg of an expired swap.
    async fn refund_swap(&self, swap_id: &SwapId) -> Result<SwapRecord, SwapError>;

    /// Swaps where `address` is the user or the recipient, newest first.
    async fn get_user_swaps(&self, address: &str) -> Result<Vec<SwapRecord>, SwapError>;
}
