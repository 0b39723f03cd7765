//! Block header and candidate block
//!
//! The header is hashed over a fixed-width binary encoding, and the
//! proof-of-work check compares the digest with the target as 256-bit
//! big-endian unsigned integers.

use std::fmt;

use thiserror::Error;

use super::transaction::Transaction;
use crate::crypto::{double_sha256, hash_from_hex, merkle_root, to_hex, Hash256, HashError};

// =============================================================================
// Block Constants
// =============================================================================

/// Serialized header size: version (4) + previous hash (32) + merkle root (32)
/// + timestamp (4) + target (32) + nonce (4)
pub const BLOCK_HEADER_SIZE: usize = 108;

/// Header version used for new candidate blocks
pub const BLOCK_VERSION: i32 = 1;

/// Previous-block sentinel for a fresh chain
pub const NULL_HASH: Hash256 = [0u8; 32];

/// Default difficulty target
pub const DEFAULT_TARGET_HEX: &str =
    "0000ffff00000000000000000000000000000000000000000000000000000000";

// =============================================================================
// Block Errors
// =============================================================================

/// Block validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Block has no transactions")]
    NoTransactions,
    #[error("First transaction is not a coinbase")]
    MissingCoinbase,
    #[error("Invalid merkle root")]
    InvalidMerkleRoot,
    #[error("Invalid proof of work: hash {0} above target")]
    InvalidProofOfWork(String),
    #[error("Invalid target: {0}")]
    InvalidTarget(#[from] HashError),
}

// =============================================================================
// Target
// =============================================================================

/// A 256-bit difficulty target, stored big-endian
///
/// Ordering on the byte array is numeric ordering, so a hash meets the
/// target when `hash <= target` byte-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target(pub Hash256);

impl Target {
    /// The largest possible target; every hash meets it
    pub const MAX: Target = Target([0xff; 32]);

    pub fn from_hex(text: &str) -> Result<Self, BlockError> {
        Ok(Self(hash_from_hex(text)?))
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    pub fn as_bytes(&self) -> &Hash256 {
        &self.0
    }

    /// Target requiring `bits` leading zero bits
    pub fn from_leading_zero_bits(bits: u32) -> Self {
        let mut target = [0xff; 32];
        let full_bytes = (bits as usize / 8).min(32);
        let remaining_bits = bits % 8;

        for byte in target.iter_mut().take(full_bytes) {
            *byte = 0;
        }
        if remaining_bits > 0 && full_bytes < 32 {
            target[full_bytes] = 0xff >> remaining_bits;
        }

        Self(target)
    }

    /// Number of leading zero bits of the target
    pub fn leading_zero_bits(&self) -> u32 {
        leading_zero_bits(&self.0)
    }

    /// Check whether `hash`, read as a big-endian integer, is ≤ the target
    pub fn is_met_by(&self, hash: &Hash256) -> bool {
        hash <= &self.0
    }
}

impl Default for Target {
    fn default() -> Self {
        let mut target = [0u8; 32];
        target[2] = 0xff;
        target[3] = 0xff;
        Self(target)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Count leading zero bits of a big-endian byte string
pub fn leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut zeros = 0;
    for byte in bytes {
        if *byte == 0 {
            zeros += 8;
        } else {
            zeros += byte.leading_zeros();
            break;
        }
    }
    zeros
}

// =============================================================================
// Block Header
// =============================================================================

/// Block header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub previous_block_hash: Hash256,
    pub merkle_root: Hash256,
    /// Unix time in seconds
    pub timestamp: u32,
    pub target: Target,
    pub nonce: u32,
}

impl BlockHeader {
    /// Create a header template with nonce 0
    pub fn new(previous_block_hash: Hash256, merkle_root: Hash256, timestamp: u32, target: Target) -> Self {
        Self {
            version: BLOCK_VERSION,
            previous_block_hash,
            merkle_root,
            timestamp,
            target,
            nonce: 0,
        }
    }

    /// Fixed-width binary encoding; integers little-endian, hashes and target as stored
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        header[0..4].copy_from_slice(&self.version.to_le_bytes());
        header[4..36].copy_from_slice(&self.previous_block_hash);
        header[36..68].copy_from_slice(&self.merkle_root);
        header[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        header[72..104].copy_from_slice(self.target.as_bytes());
        header[104..108].copy_from_slice(&self.nonce.to_le_bytes());
        header
    }

    /// Calculate the hash of the block header
    pub fn hash(&self) -> Hash256 {
        double_sha256(&self.serialize())
    }

    pub fn hash_hex(&self) -> String {
        to_hex(&self.hash())
    }

    /// Check if the hash meets the difficulty target
    pub fn meets_target(&self) -> bool {
        self.target.is_met_by(&self.hash())
    }
}

/// Report form: fields space-joined on one line
impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.version,
            to_hex(&self.previous_block_hash),
            to_hex(&self.merkle_root),
            self.timestamp,
            self.target,
            self.nonce
        )
    }
}

// =============================================================================
// Block
// =============================================================================

/// A candidate block: header plus transactions, coinbase first
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// Calculate the merkle root over transaction IDs, in order
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Result<Hash256, BlockError> {
        let leaves: Vec<Hash256> = transactions.iter().map(Transaction::txid).collect();
        merkle_root(&leaves).ok_or(BlockError::NoTransactions)
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Get the coinbase transaction (first transaction)
    pub fn coinbase_tx(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Verify the block's merkle root
    pub fn verify_merkle_root(&self) -> bool {
        Self::calculate_merkle_root(&self.transactions)
            .map(|root| root == self.header.merkle_root)
            .unwrap_or(false)
    }

    /// Coinbase first, merkle root matches, header hash meets target
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.transactions.is_empty() {
            return Err(BlockError::NoTransactions);
        }
        if self.coinbase_tx().is_none() {
            return Err(BlockError::MissingCoinbase);
        }
        if !self.verify_merkle_root() {
            return Err(BlockError::InvalidMerkleRoot);
        }
        if !self.header.meets_target() {
            return Err(BlockError::InvalidProofOfWork(self.header.hash_hex()));
        }
        Ok(())
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
