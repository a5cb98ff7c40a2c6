//! # Timelock Scheduling
//!
//! Turns a relative swap timelock into the two absolute leg expiries.

use crate::domain::{
    invariant_timelock_bounds, invariant_timelock_ordering, SwapConfig, SwapError, Timelock,
};

/// Absolute expiries of both legs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimelockSchedule {
    /// Source leg expiry (`created_at + timelock`).
    pub source: u64,
    /// Destination leg expiry (`source - margin`).
    pub destination: u64,
    /// Gap between the two.
    pub margin: u64,
}

/// Resolve the requested timelock against the configured default and bounds.
pub fn resolve_timelock(requested: Option<u64>, config: &SwapConfig) -> Result<u64, SwapError> {
    let timelock = requested.unwrap_or(config.default_timelock_secs);
    invariant_timelock_bounds(timelock, config.min_timelock_secs, config.max_timelock_secs)?;
    Ok(timelock)
}

/// Destination margin for a timelock, capped at half of it.
pub fn destination_margin(timelock: u64, config: &SwapConfig) -> u64 {
    config.destination_margin_secs.min(timelock / 2)
}

/// Order timelock periods for a swap timelock.
pub fn order_timelock(timelock: u64, config: &SwapConfig) -> Timelock {
    Timelock {
        withdrawal_period: timelock - destination_margin(timelock, config),
        cancellation_period: timelock,
    }
}

/// Calculate both leg expiries for a swap created at `created_at`.
pub fn calculate_timelocks(
    created_at: u64,
    timelock: u64,
    config: &SwapConfig,
) -> Result<TimelockSchedule, SwapError> {
    let source = created_at
        .checked_add(timelock)
        .ok_or_else(|| SwapError::validation("timelock overflows"))?;
    let margin = destination_margin(timelock, config);
    let destination = source - margin;
    invariant_timelock_ordering(source, destination)?;
    Ok(TimelockSchedule {
        source,
        destination,
        margin,
    })
}
