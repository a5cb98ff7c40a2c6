//! # Swap Configuration

use serde::{Deserialize, Serialize};

/// Default swap timelock (24 hours).
pub const DEFAULT_TIMELOCK_SECS: u64 = 24 * 3600;

/// Shortest accepted timelock (1 hour).
pub const MIN_TIMELOCK_SECS: u64 = 3600;

/// Longest accepted timelock (48 hours).
pub const MAX_TIMELOCK_SECS: u64 = 48 * 3600;

/// Gap between destination and source expiry (6 hours).
pub const DESTINATION_MARGIN_SECS: u64 = 6 * 3600;

/// Highest accepted service fee (10%).
pub const MAX_FEE_BPS: u32 = 1000;

/// Coordinator configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapConfig {
    /// Timelock used when a request omits one.
    pub default_timelock_secs: u64,
    /// Lower bound on requested timelocks.
    pub min_timelock_secs: u64,
    /// Upper bound on requested timelocks.
    pub max_timelock_secs: u64,
    /// How long before the source leg the destination leg expires.
    /// Capped at half the timelock.
    pub destination_margin_secs: u64,
    /// Service fee in basis points, withheld from the destination amount.
    #[serde(default)]
    pub fee_bps: u32,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            default_timelock_secs: DEFAULT_TIMELOCK_SECS,
            min_timelock_secs: MIN_TIMELOCK_SECS,
            max_timelock_secs: MAX_TIMELOCK_SECS,
            destination_margin_secs: DESTINATION_MARGIN_SECS,
            fee_bps: 0,
        }
    }
}
