//! Core block assembly components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (canonical encoding, txid, coinbase)
//! - P2PKH locking scripts
//! - Transaction validation
//! - Fee accounting
//! - Block headers, targets and candidate blocks

pub mod block;
pub mod fee;
pub mod script;
pub mod transaction;
pub mod validation;

pub use block::{
    leading_zero_bits, Block, BlockError, BlockHeader, Target, BLOCK_HEADER_SIZE, BLOCK_VERSION,
    DEFAULT_TARGET_HEX, NULL_HASH,
};
pub use fee::{total_fee, transaction_fee, FeeError};
pub use script::{Script, ScriptError, ScriptType};
pub use transaction::{
    Outpoint, Transaction, TransactionBuilder, TransactionError, TxInput, TxOutput, NULL_TXID,
};
pub use validation::{FilterOutcome, RejectReason, TransactionValidator, ValidationResult};
