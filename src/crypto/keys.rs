//! ECDSA signature recovery and verification
//!
//! Signatures travel in the 65-byte compact form `r || s || recovery_id`.
//! The verifier never trusts a key supplied alongside the signature: it
//! recovers the public key from the signature and the digest, checks the
//! recovered key against the claim, then runs standard ECDSA verification.

use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::{double_sha256, hash160, Hash256};

/// Length of a compact recoverable signature: r (32) + s (32) + recovery id (1)
pub const COMPACT_SIGNATURE_SIZE: usize = 65;

/// First header byte of the legacy compact-signature convention (27 + recid, +4 if compressed)
pub const LEGACY_RECOVERY_OFFSET: u8 = 27;

/// Address version byte (mainnet P2PKH)
pub const ADDRESS_VERSION: u8 = 0x00;

/// Errors that can occur during key and signature operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid signature length: expected {} bytes, got {0}", COMPACT_SIGNATURE_SIZE)]
    InvalidLength(usize),
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("Malformed signature: {0}")]
    Malformed(secp256k1::Error),
    #[error("Public key recovery failed: {0}")]
    RecoveryFailed(secp256k1::Error),
    #[error("Recovered key does not match the claimed key")]
    KeyMismatch,
    #[error("Signature verification failed")]
    VerificationFailed,
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
}

/// The key an input claims to be signed by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimedKey {
    /// An explicit public key
    PublicKey(PublicKey),
    /// A HASH160 commitment to a public key (from a P2PKH locking script)
    PubKeyHash([u8; 20]),
}

impl ClaimedKey {
    /// Check whether `key` satisfies this claim
    ///
    /// Hash claims accept either the compressed or the uncompressed encoding.
    pub fn matches(&self, key: &PublicKey) -> bool {
        match self {
            ClaimedKey::PublicKey(claimed) => claimed == key,
            ClaimedKey::PubKeyHash(hash) => {
                hash160(&key.serialize()) == *hash
                    || hash160(&key.serialize_uncompressed()) == *hash
            }
        }
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(hex_key).map_err(|_| SignatureError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| SignatureError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// HASH160 of the compressed public key
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public_key.serialize())
    }

    /// Base58Check P2PKH address of this key
    pub fn address(&self) -> String {
        public_key_to_address(&self.public_key)
    }

    /// Sign a 32-byte digest, producing a 65-byte compact recoverable signature
    pub fn sign_recoverable(&self, digest: &Hash256) -> Result<[u8; COMPACT_SIGNATURE_SIZE], SignatureError> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(digest).map_err(SignatureError::Malformed)?;
        let signature = secp.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut out = [0u8; COMPACT_SIGNATURE_SIZE];
        out[..64].copy_from_slice(&compact);
        out[64] = recovery_id.to_i32() as u8;
        Ok(out)
    }
}

/// Convert a public key to a Base58Check address (compressed encoding)
pub fn public_key_to_address(public_key: &PublicKey) -> String {
    pubkey_hash_to_address(&hash160(&public_key.serialize()))
}

/// Base58Check(version || hash || checksum)
pub fn pubkey_hash_to_address(hash: &[u8; 20]) -> String {
    let mut address_bytes = vec![ADDRESS_VERSION];
    address_bytes.extend_from_slice(hash);

    let checksum = double_sha256(&address_bytes);
    address_bytes.extend_from_slice(&checksum[..4]);

    bs58::encode(address_bytes).into_string()
}

/// Parse a public key from hex string (compressed or uncompressed)
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, SignatureError> {
    let bytes = hex::decode(hex_key).map_err(|_| SignatureError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| SignatureError::InvalidPublicKey)
}

/// Normalise the trailing recovery byte to a `RecoveryId`
fn recovery_id_from_byte(byte: u8) -> Result<RecoveryId, SignatureError> {
    let id = match byte {
        0..=3 => byte,
        27..=34 => (byte - LEGACY_RECOVERY_OFFSET) % 4,
        _ => return Err(SignatureError::InvalidRecoveryId(byte)),
    };
    RecoveryId::from_i32(i32::from(id)).map_err(|_| SignatureError::InvalidRecoveryId(byte))
}

/// Parse a 65-byte compact signature into its recoverable form
pub fn parse_compact(signature: &[u8]) -> Result<RecoverableSignature, SignatureError> {
    if signature.len() != COMPACT_SIGNATURE_SIZE {
        return Err(SignatureError::InvalidLength(signature.len()));
    }
    let recovery_id = recovery_id_from_byte(signature[64])?;
    RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(SignatureError::Malformed)
}

/// Recover the public key that produced `signature` over `digest`
pub fn recover_public_key(digest: &Hash256, signature: &[u8]) -> Result<PublicKey, SignatureError> {
    let recoverable = parse_compact(signature)?;
    let message = Message::from_digest_slice(digest).map_err(SignatureError::Malformed)?;
    Secp256k1::verification_only()
        .recover_ecdsa(&message, &recoverable)
        .map_err(SignatureError::RecoveryFailed)
}

/// Recover, match against the claim, then verify
///
/// Returns the recovered key on success so callers can log or cache it.
pub fn verify_recoverable(
    digest: &Hash256,
    signature: &[u8],
    claimed: &ClaimedKey,
) -> Result<PublicKey, SignatureError> {
    let recovered = recover_public_key(digest, signature)?;
    if !claimed.matches(&recovered) {
        return Err(SignatureError::KeyMismatch);
    }

    let recoverable = parse_compact(signature)?;
    let message = Message::from_digest_slice(digest).map_err(SignatureError::Malformed)?;
    Secp256k1::verification_only()
        .verify_ecdsa(&message, &recoverable.to_standard(), &recovered)
        .map_err(|_| SignatureError::VerificationFailed)?;

    Ok(recovered)
}

/// Boolean form of [`verify_recoverable`]
pub fn verify(digest: &Hash256, signature: &[u8], claimed: &ClaimedKey) -> bool {
    verify_recoverable(digest, signature, claimed).is_ok()
}
