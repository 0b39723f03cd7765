//! Cryptographic hashing utilities
//!
//! Provides the SHA-256 based primitives used for transaction IDs,
//! merkle trees and block header hashes, plus the hex helpers every
//! other component uses to move between raw bytes and display strings.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Size of every digest produced by this module (except `hash160`)
pub const HASH_SIZE: usize = 32;

/// A raw 32-byte digest
pub type Hash256 = [u8; HASH_SIZE];

/// Hex conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> Hash256 {
    sha256(&sha256(data))
}

/// Computes double SHA-256 hash and returns it as a hex string
pub fn double_sha256_hex(data: &[u8]) -> String {
    to_hex(&double_sha256(data))
}

/// RIPEMD160(SHA256(data)), the public key hash used by P2PKH scripts
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(data));
    ripemd.finalize().into()
}

/// Lowercase hex encoding
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex string of any length
pub fn from_hex(text: &str) -> Result<Vec<u8>, HashError> {
    hex::decode(text).map_err(|e| HashError::InvalidHex(e.to_string()))
}

/// Decode a hex string that must hold exactly 32 bytes
pub fn hash_from_hex(text: &str) -> Result<Hash256, HashError> {
    let bytes = from_hex(text)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| HashError::InvalidLength {
            expected: HASH_SIZE,
            actual: bytes.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        assert_eq!(
            to_hex(&sha256(data)),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_double_sha256() {
        let data = b"hello world";
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
        assert_eq!(double_sha256(data), double_sha256(data));
        assert_eq!(double_sha256_hex(data), to_hex(&double_sha256(data)));
    }

    #[test]
    fn test_hash160_length_and_determinism() {
        let a = hash160(b"key");
        assert_eq!(a.len(), 20);
        assert_eq!(a, hash160(b"key"));
        assert_ne!(a, hash160(b"other key"));
    }

    #[test]
    fn test_hex_is_lowercase() {
        assert_eq!(to_hex(&[0xAB, 0x01]), "ab01");
        assert_eq!(from_hex("AB01").unwrap(), vec![0xAB, 0x01]);
    }

    #[test]
    fn test_hash_from_hex_rejects_wrong_length() {
        assert_eq!(
            hash_from_hex("abcd"),
            Err(HashError::InvalidLength {
                expected: 32,
                actual: 2
            })
        );
        assert!(matches!(hash_from_hex("zz"), Err(HashError::InvalidHex(_))));
        assert_eq!(hash_from_hex(&"00".repeat(32)).unwrap(), [0u8; 32]);
    }

    proptest! {
        #[test]
        fn prop_hex_round_trip(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
            prop_assert_eq!(from_hex(&to_hex(&bytes)).unwrap(), bytes);
        }

        #[test]
        fn prop_double_sha256_deterministic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(double_sha256(&bytes), double_sha256(&bytes));
        }
    }
}
