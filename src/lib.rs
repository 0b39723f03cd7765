//! Block Assembler: candidate block construction and proof-of-work mining
//!
//! This crate turns a pool of pending transactions into a mined block:
//! - Signature validation with ECDSA public key recovery (secp256k1)
//! - Fee accounting and coinbase construction
//! - Merkle root calculation and inclusion proofs
//! - Fixed-layout block headers with 256-bit targets
//! - Cancellable, bounded, optionally parallel nonce search
//! - A line-oriented block report
//!
//! # Example
//!
//! ```rust
//! use block_assembler::core::{Script, Target, TransactionBuilder};
//! use block_assembler::crypto::KeyPair;
//! use block_assembler::mining::{AssemblerConfig, BlockAssembler};
//!
//! // Spend a 1000 unit prevout into a 900 unit output
//! let key = KeyPair::generate();
//! let tx = TransactionBuilder::new()
//!     .add_signed_input(&key, &"ab".repeat(32), 1000)
//!     .unwrap()
//!     .add_output(900, Script::p2pkh(&key.pubkey_hash()))
//!     .build();
//!
//! // Mine against an easy target
//! let config = AssemblerConfig {
//!     target: Target::from_leading_zero_bits(4),
//!     ..Default::default()
//! };
//! let assembled = BlockAssembler::new(config).assemble(vec![tx]).unwrap();
//! println!("Mined {} with nonce {}", assembled.block.header.hash_hex(), assembled.block.header.nonce);
//! assert_eq!(assembled.stats.total_fee, 100);
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod mining;

// Re-export commonly used types
pub use core::{
    Block, BlockHeader, RejectReason, Script, Target, Transaction, TransactionBuilder,
    TransactionValidator, TxInput, TxOutput, ValidationResult,
};
pub use crypto::{double_sha256, merkle_root, KeyPair, MerkleProof};
pub use mining::{
    AssembledBlock, AssemblerConfig, AssemblyStats, BlockAssembler, BlockMiner, CancelToken,
    Mempool, MiningConfig, MiningOutcome, StopReason,
};
