//! # Algorithms Module
//!
//! Pure swap logic: timelock scheduling, fees and script-based HTLC construction.

pub mod fee;
pub mod htlc_script;
pub mod timelock;

pub use fee::{split_fee, BPS_DENOMINATOR};
pub use htlc_script::{
    create_refund_transaction_data, create_withdrawal_transaction_data, generate_htlc_address,
    generate_htlc_script, p2pkh_address, parse_htlc_script, parse_spend_script_sig,
    verify_htlc_script, FundingUtxo, HtlcScriptParams, ParsedSpend, SpendBranch, SpendDescriptor,
};
pub use timelock::{
    calculate_timelocks, destination_margin, order_timelock, resolve_timelock, TimelockSchedule,
};
