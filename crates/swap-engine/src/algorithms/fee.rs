//! # Service Fee
//!
//! Basis-point fee withheld from the destination amount on claim.

/// Basis points in one whole.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Split `amount` into the part paid out and the fee withheld.
///
/// Rounds the fee down, so a zero rate or a dust amount keeps everything.
pub fn split_fee(amount: u128, fee_bps: u32) -> (u128, u128) {
    let bps = u128::from(fee_bps).min(BPS_DENOMINATOR);
    // Divide first so large amounts cannot overflow.
    let fee = amount / BPS_DENOMINATOR * bps + amount % BPS_DENOMINATOR * bps / BPS_DENOMINATOR;
    (amount - fee, fee)
}
