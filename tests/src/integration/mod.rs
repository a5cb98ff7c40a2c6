//! # Integration Tests
//!
//! Every test builds a fresh [`Devnet`](swap_engine::test_utils::Devnet):
//! two EVM devnets and a regtest node on one manual clock.

pub mod concurrency;
pub mod flows;
pub mod persistence;
pub mod scenarios;

use swap_engine::test_utils::Devnet;
use swap_engine::SwapRequest;

/// EVM user that funds the source leg.
pub const ALICE: u8 = 0x22;

/// Regtest user that receives the destination leg.
pub const BOB: u8 = 0x33;

/// Amount small enough for the regtest wallet at a 1:1 placeholder quote.
pub const SWAP_AMOUNT: u128 = 500_000;

/// ETH -> BTC request from `user` paying `recipient`.
pub fn eth_to_btc(user: String, recipient: Option<String>, amount: u128) -> SwapRequest {
    SwapRequest {
        from_chain: "ethereum".to_string(),
        to_chain: "bitcoin".to_string(),
        from_token: "ETH".to_string(),
        to_token: "BTC".to_string(),
        from_amount: amount.to_string(),
        user_address: user,
        recipient_address: recipient,
        timelock: None,
    }
}

/// ETH -> BTC request from a funded [`ALICE`] to [`BOB`].
pub fn funded_eth_to_btc(devnet: &Devnet, amount: u128) -> SwapRequest {
    devnet.ethereum.mint(Devnet::evm_address(ALICE), amount);
    eth_to_btc(Devnet::evm_user(ALICE), Some(devnet.bitcoin_user(BOB)), amount)
}
