//! # Secrets and Hashlocks
//!
//! Every leg of every swap verifies the same hash function: SHA-256.
//! A secret redeemed on one ledger is only useful on the other ledger if
//! both hashlocks were produced the same way, so nothing else in the
//! workspace hashes secrets directly.
//!
//! ## Security
//!
//! - Secrets come from the OS-seeded CSPRNG (`rand::thread_rng`).
//! - `verify_secret` compares digests in constant time (`subtle`).
//! - `Secret` zeroizes its bytes on drop and never prints them.

use crate::errors::{decode_hex, CryptoError};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret length in bytes.
pub const SECRET_LEN: usize = 32;

/// Hashlock length in bytes (SHA-256 output).
pub const HASHLOCK_LEN: usize = 32;

/// SHA-256 digest of a secret.
pub type Hashlock = [u8; HASHLOCK_LEN];

/// HTLC preimage. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    inner: [u8; SECRET_LEN],
}

impl Secret {
    /// Wrap raw secret bytes.
    pub fn new(bytes: [u8; SECRET_LEN]) -> Self {
        Self { inner: bytes }
    }

    /// Copy from a slice, `None` unless it is exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != SECRET_LEN {
            return None;
        }
        let mut inner = [0u8; SECRET_LEN];
        inner.copy_from_slice(slice);
        Some(Self { inner })
    }

    /// Parse from hex (optional `0x` prefix).
    pub fn from_hex(input: &str) -> Result<Self, CryptoError> {
        let bytes = decode_hex(input)?;
        let len = bytes.len();
        Self::from_slice(&bytes).ok_or(CryptoError::InvalidLength {
            expected: SECRET_LEN,
            actual: len,
        })
    }

    /// Borrow the secret bytes. Do not hold on to the reference.
    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.inner
    }

    /// Hex encoding of the secret.
    pub fn to_hex(&self) -> String {
        hex::encode(self.inner)
    }

    /// The hashlock this secret opens.
    pub fn hashlock(&self) -> Hashlock {
        hashlock_of(&self.inner)
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.inner[..].ct_eq(&other.inner[..]).into()
    }
}

impl Eq for Secret {}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Draw a fresh 32-byte secret and compute its hashlock.
pub fn generate_secret_and_hashlock() -> (Secret, Hashlock) {
    let mut bytes = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret = Secret::new(bytes);
    bytes.zeroize();
    let hashlock = secret.hashlock();
    (secret, hashlock)
}

/// SHA-256 of an arbitrary preimage.
pub fn hashlock_of(preimage: &[u8]) -> Hashlock {
    Sha256::digest(preimage).into()
}

/// Check `SHA-256(secret) == hashlock`.
///
/// Returns `false` for malformed input (wrong lengths). The digest
/// comparison touches every byte regardless of where a mismatch occurs.
pub fn verify_secret(secret: &[u8], hashlock: &[u8]) -> bool {
    if secret.len() != SECRET_LEN || hashlock.len() != HASHLOCK_LEN {
        return false;
    }
    let computed = hashlock_of(secret);
    computed[..].ct_eq(hashlock).into()
}

/// Parse a hex hashlock (optional `0x` prefix).
pub fn parse_hashlock(input: &str) -> Result<Hashlock, CryptoError> {
    let bytes = decode_hex(input)?;
    if bytes.len() != HASHLOCK_LEN {
        return Err(CryptoError::InvalidLength {
            expected: HASHLOCK_LEN,
            actual: bytes.len(),
        });
    }
    let mut hashlock = [0u8; HASHLOCK_LEN];
    hashlock.copy_from_slice(&bytes);
    Ok(hashlock)
}
