//! # ECDSA Signatures (secp256k1)
//!
//! Key material for the ledger-facing adapters.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization (BIP-62 / EIP-2)
//! - Constant-time operations
//!
//! ## Use Cases
//!
//! - Script-chain spends: DER signatures over legacy sighash digests
//! - Account-chain identities: Keccak-256 address derivation

use crate::errors::{decode_hex, CryptoError};
use k256::ecdsa::{
    signature::hazmat::{PrehashSigner, PrehashVerifier},
    Signature, SigningKey, VerifyingKey,
};
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

/// Compressed secp256k1 public key length.
pub const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Secp256k1PublicKey([u8; COMPRESSED_PUBKEY_LEN]);

impl Secp256k1PublicKey {
    /// Create from compressed bytes (33 bytes, starting with 0x02 or 0x03).
    pub fn from_bytes(bytes: [u8; COMPRESSED_PUBKEY_LEN]) -> Result<Self, CryptoError> {
        // Validate it's a valid compressed point
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Parse from a byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        if slice.len() != COMPRESSED_PUBKEY_LEN {
            return Err(CryptoError::InvalidLength {
                expected: COMPRESSED_PUBKEY_LEN,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; COMPRESSED_PUBKEY_LEN];
        bytes.copy_from_slice(slice);
        Self::from_bytes(bytes)
    }

    /// Parse from hex (optional `0x` prefix).
    pub fn from_hex(input: &str) -> Result<Self, CryptoError> {
        Self::from_slice(&decode_hex(input)?)
    }

    /// Get raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; COMPRESSED_PUBKEY_LEN] {
        &self.0
    }

    /// Lowercase hex of the compressed key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a DER signature over a 32-byte digest.
    pub fn verify_digest(&self, digest: &[u8; 32], der_signature: &[u8]) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = Signature::from_der(der_signature).map_err(|_| CryptoError::InvalidSignature)?;
        verifying_key
            .verify_prehash(digest, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    /// Account-chain address: last 20 bytes of Keccak-256 over the
    /// uncompressed point (without the 0x04 tag).
    pub fn evm_address(&self) -> Result<[u8; 20], CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let uncompressed = verifying_key.to_encoded_point(false);
        let digest = Keccak256::digest(&uncompressed.as_bytes()[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[12..]);
        Ok(address)
    }
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Create from a hex secret key.
    pub fn from_hex(input: &str) -> Result<Self, CryptoError> {
        let mut raw = decode_hex(input)?;
        if raw.len() != 32 {
            let actual = raw.len();
            raw.zeroize();
            return Err(CryptoError::InvalidLength {
                expected: 32,
                actual,
            });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&raw);
        raw.zeroize();
        let keypair = Self::from_bytes(bytes);
        bytes.zeroize();
        keypair
    }

    /// Get public key (compressed, 33 bytes).
    pub fn public_key(&self) -> Secp256k1PublicKey {
        let point = self.signing_key.verifying_key().to_encoded_point(true);
        let mut bytes = [0u8; COMPRESSED_PUBKEY_LEN];
        bytes.copy_from_slice(point.as_bytes());
        Secp256k1PublicKey(bytes)
    }

    /// Sign a precomputed 32-byte digest, returning a low-S DER signature.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let sig: Signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let sig = sig.normalize_s().unwrap_or(sig);
        Ok(sig.to_der().as_bytes().to_vec())
    }

    /// Account-chain address of this key.
    pub fn evm_address(&self) -> Result<[u8; 20], CryptoError> {
        self.public_key().evm_address()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

impl std::fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secp256k1KeyPair({})", self.public_key().to_hex())
    }
}
