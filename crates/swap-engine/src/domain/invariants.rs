//! # Domain Invariants
//!
//! Business rules shared by the coordinator and the adapters.

use super::errors::SwapError;
use swap_crypto::Hashlock;

/// Invariant: Timelock ordering.
///
/// The destination leg MUST expire strictly before the source leg, so the
/// party that redeemed the destination can still reach a refund on a source
/// leg that was never claimed.
pub fn invariant_timelock_ordering(
    source_timelock: u64,
    destination_timelock: u64,
) -> Result<(), SwapError> {
    if destination_timelock >= source_timelock {
        return Err(SwapError::validation(format!(
            "destination timelock {} must be before source timelock {}",
            destination_timelock, source_timelock
        )));
    }
    Ok(())
}

/// Invariant: Hashlock match.
///
/// Both legs, and any script built for them, use the order's hashlock.
pub fn invariant_hashlock_match(expected: &Hashlock, actual: &Hashlock) -> Result<(), SwapError> {
    if expected != actual {
        return Err(SwapError::validation(format!(
            "hashlock mismatch: expected {}, got {}",
            hex::encode(expected),
            hex::encode(actual)
        )));
    }
    Ok(())
}

/// Invariant: Timelock bounds.
pub fn invariant_timelock_bounds(timelock: u64, min: u64, max: u64) -> Result<(), SwapError> {
    if timelock < min || timelock > max {
        return Err(SwapError::validation(format!(
            "timelock {}s outside [{}s, {}s]",
            timelock, min, max
        )));
    }
    Ok(())
}
