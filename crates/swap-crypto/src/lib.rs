//! # Swap Crypto - Secrets, Hashlocks and Ledger Keys
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashlock` | SHA-256 | Secret generation, hashlock derivation, verification |
//! | `ecdsa` | secp256k1 | Script-chain spend signatures, account-chain addresses |
//!
//! ## Security Properties
//!
//! - **Hashlocks**: one hash function system-wide, constant-time verification
//! - **Secrets**: CSPRNG-drawn, zeroized on drop, redacted in `Debug`
//! - **secp256k1**: RFC 6979 deterministic, low-S normalization

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashlock;

// Re-exports
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, COMPRESSED_PUBKEY_LEN};
pub use errors::CryptoError;
pub use hashlock::{
    generate_secret_and_hashlock, hashlock_of, parse_hashlock, verify_secret, Hashlock, Secret,
    HASHLOCK_LEN, SECRET_LEN,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
