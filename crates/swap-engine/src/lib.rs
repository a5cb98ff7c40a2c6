//! # Swap Engine
//!
//! Cross-ledger atomic swaps over Hash Time-Locked Contracts.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Exchange assets between a smart-contract ledger and a script ledger (or
//! two smart-contract ledgers) without trusting the counterparty:
//! - One SHA-256 hashlock guards both legs
//! - The destination leg expires strictly before the source leg
//! - Revealing the secret on one ledger makes the other leg claimable
//!
//! ## Safety Properties
//!
//! | Property | Enforced by |
//! |----------|-------------|
//! | Same hashlock on both legs | `invariant_hashlock_match` |
//! | Destination expires first | `calculate_timelocks` |
//! | Redeem only before expiry | chain adapters |
//! | Refund only after expiry | chain adapters, `refund_swap` |
//! | One mutation at a time per swap | per-swap lock in the coordinator |
//!
//! ## Module Structure
//!
//! ```text
//! swap-engine/
//! ├── domain/          # Orders, swap records, state machines, errors
//! ├── algorithms/      # Timelock schedule, P2SH HTLC scripts
//! ├── ports/           # SwapApi, ChainAdapter, KeyValueStore, PricingService
//! ├── adapters/        # EVM, Bitcoin, storage, pricing, clocks
//! ├── store.rs         # Durable orders and swap records
//! ├── registry.rs      # Chain id -> adapter
//! └── service/         # SwapCoordinator
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod registry;
pub mod service;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use algorithms::{
    calculate_timelocks, generate_htlc_address, generate_htlc_script, parse_htlc_script,
    split_fee, verify_htlc_script, HtlcScriptParams, TimelockSchedule, BPS_DENOMINATOR,
};
pub use domain::{
    ChainFamily, ChainId, HtlcState, Order, OrderId, OrderStatus, OrderType, Quote, QuoteRequest,
    QuoteSource, ReverseOrder, SwapConfig, SwapError, SwapId, SwapRecord, SwapRequest,
    SwapStatistics, SwapStatus, MAX_FEE_BPS,
};
pub use ports::{
    ChainAdapter, HtlcLock, HtlcParams, HtlcStatusReport, KeyValueStore, PricingService, SwapApi,
    TimeSource,
};
pub use registry::AdapterRegistry;
pub use service::{SwapCoordinator, SwapDependencies};
pub use store::{OrderFilter, OrderPatch, OrderStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
