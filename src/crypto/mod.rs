//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 / double SHA-256 / HASH160 hashing and hex helpers
//! - ECDSA public key recovery and verification (secp256k1)
//! - Merkle tree calculations and inclusion proofs

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{
    double_sha256, double_sha256_hex, from_hex, hash160, hash_from_hex, sha256, to_hex,
    Hash256, HashError, HASH_SIZE,
};
pub use keys::{
    pubkey_hash_to_address, public_key_from_hex, public_key_to_address, recover_public_key,
    verify, verify_recoverable, ClaimedKey, KeyPair, SignatureError, COMPACT_SIGNATURE_SIZE,
};
pub use merkle::{hash_pair, merkle_proof, merkle_root, MerkleProof};
