//! Minimal ABI codec for the hashed-timelock contract calls.
//!
//! Static argument types only: every argument is one 32-byte word.

use crate::domain::SwapError;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// 20-byte account address.
pub type EvmAddress = [u8; 20];

/// 32-byte ABI word.
pub type Word = [u8; 32];

/// `newContract` for native value.
pub const NEW_CONTRACT_ETH: &str = "newContract(address,bytes32,uint256)";
/// `newContract` for ERC-20 tokens.
pub const NEW_CONTRACT_ERC20: &str = "newContract(address,bytes32,uint256,address,uint256)";
/// Redeem with the preimage.
pub const WITHDRAW: &str = "withdraw(bytes32,bytes32)";
/// Refund after the timelock.
pub const REFUND: &str = "refund(bytes32)";
/// ERC-20 allowance.
pub const APPROVE: &str = "approve(address,uint256)";

/// A static ABI argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    /// `address`
    Address(EvmAddress),
    /// `bytes32`
    Bytes32(Word),
    /// `uint256` restricted to u128
    Uint(u128),
}

impl Token {
    fn to_word(self) -> Word {
        let mut word = [0u8; 32];
        match self {
            Token::Address(addr) => word[12..].copy_from_slice(&addr),
            Token::Bytes32(bytes) => word = bytes,
            Token::Uint(value) => word[16..].copy_from_slice(&value.to_be_bytes()),
        }
        word
    }
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Calldata for `signature(args...)`.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    data
}

/// Split calldata into selector and argument words.
pub fn decode_call(data: &[u8]) -> Result<([u8; 4], Vec<Word>), SwapError> {
    if data.len() < 4 || (data.len() - 4) % 32 != 0 {
        return Err(SwapError::validation(format!(
            "calldata length {} is not selector + words",
            data.len()
        )));
    }
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&data[..4]);
    let words = data[4..]
        .chunks_exact(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect();
    Ok((sel, words))
}

/// Word as an address; upper 12 bytes must be zero.
pub fn word_to_address(word: &Word) -> Result<EvmAddress, SwapError> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(SwapError::validation("dirty address word"));
    }
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&word[12..]);
    Ok(addr)
}

/// Word as a uint that fits u128.
pub fn word_to_u128(word: &Word) -> Result<u128, SwapError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(SwapError::validation("uint256 exceeds u128"));
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(bytes))
}

/// Parse `0x`-prefixed 40-hex-digit address.
pub fn parse_address(s: &str) -> Result<EvmAddress, SwapError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| SwapError::validation(format!("address {} lacks 0x prefix", s)))?;
    let bytes = hex::decode(digits)
        .map_err(|e| SwapError::validation(format!("address {}: {}", s, e)))?;
    bytes
        .try_into()
        .map_err(|_| SwapError::validation(format!("address {} is not 20 bytes", s)))
}

/// Lowercase `0x` rendering.
pub fn format_address(addr: &EvmAddress) -> String {
    format!("0x{}", hex::encode(addr))
}

/// `0x` rendering of a 32-byte value.
pub fn format_word(word: &Word) -> String {
    format!("0x{}", hex::encode(word))
}

/// Parse a `0x` 32-byte value.
pub fn parse_word(s: &str) -> Result<Word, SwapError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|e| SwapError::validation(format!("{}: {}", s, e)))?;
    bytes
        .try_into()
        .map_err(|_| SwapError::validation(format!("{} is not 32 bytes", s)))
}

/// Contract-side lock id: SHA-256 over the packed lock arguments.
///
/// Native: `sender ‖ receiver ‖ amount ‖ hashlock ‖ timelock`.
/// ERC-20: `sender ‖ receiver ‖ token ‖ amount ‖ hashlock ‖ timelock`.
pub fn contract_id(
    sender: &EvmAddress,
    receiver: &EvmAddress,
    token: Option<&EvmAddress>,
    amount: u128,
    hashlock: &Word,
    timelock: u64,
) -> Word {
    let mut hasher = Sha256::new();
    hasher.update(sender);
    hasher.update(receiver);
    if let Some(token) = token {
        hasher.update(token);
    }
    hasher.update(Token::Uint(amount).to_word());
    hasher.update(hashlock);
    hasher.update(Token::Uint(u128::from(timelock)).to_word());
    hasher.finalize().into()
}
