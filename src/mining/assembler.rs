//! Candidate block assembly
//!
//! Runs the whole pipeline over a pool of transactions:
//! validate → total fee → coinbase → merkle root → header → proof of work.
//! Each stage only consumes the previous stage's output.

use chrono::Utc;
use log::info;
use std::collections::BTreeMap;
use thiserror::Error;

use super::mempool::Mempool;
use super::miner::{BlockMiner, CancelToken, MiningConfig, MiningOutcome, MiningStats, StopReason};
use crate::core::{
    total_fee, Block, BlockError, BlockHeader, FeeError, RejectReason, Script, Target, Transaction,
    TransactionError, TransactionValidator, BLOCK_VERSION, NULL_HASH,
};
use crate::crypto::{to_hex, Hash256};

/// Block subsidy in minimal units
pub const DEFAULT_SUBSIDY: i64 = 2_500_000;

/// Public key hash of the default payout script
pub const DEFAULT_PAYOUT_PUBKEY_HASH: [u8; 20] = [
    0x60, 0x85, 0x31, 0x2a, 0x9c, 0x50, 0x0f, 0xf9, 0xcc, 0x35, 0xb5, 0x71, 0xb0, 0xa1, 0xe5, 0xef,
    0xb7, 0xfb, 0x9f, 0x16,
];

/// Assembly errors
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Fee error: {0}")]
    Fee(#[from] FeeError),
    #[error("Coinbase error: {0}")]
    Coinbase(#[from] TransactionError),
    #[error("Block error: {0}")]
    Block(#[from] BlockError),
    #[error("Clock error: timestamp {0} does not fit in 32 bits")]
    Timestamp(i64),
    #[error("Mining exhausted ({reason}) after {attempts} attempts")]
    MiningExhausted { reason: StopReason, attempts: u64 },
}

/// Assembly configuration
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub version: i32,
    pub subsidy: i64,
    pub target: Target,
    pub payout_script: Script,
    pub previous_block_hash: Hash256,
    /// Fixed header timestamp; the current time when `None`
    pub timestamp: Option<u32>,
    pub mining: MiningConfig,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            version: BLOCK_VERSION,
            subsidy: DEFAULT_SUBSIDY,
            target: Target::default(),
            payout_script: Script::p2pkh(&DEFAULT_PAYOUT_PUBKEY_HASH),
            previous_block_hash: NULL_HASH,
            timestamp: None,
            mining: MiningConfig::default(),
        }
    }
}

/// Counters describing one assembly run
#[derive(Debug, Clone, Default)]
pub struct AssemblyStats {
    /// Transactions offered to the validator
    pub loaded: usize,
    /// Records that never became transactions
    pub parse_failures: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub rejections_by_kind: BTreeMap<&'static str, usize>,
    pub total_fee: i64,
    pub mining: MiningStats,
}

/// A mined candidate block plus everything learned while building it
#[derive(Debug, Clone)]
pub struct AssembledBlock {
    pub block: Block,
    pub hash: Hash256,
    /// Rejected transactions as (txid hex, reason)
    pub rejected: Vec<(String, RejectReason)>,
    pub stats: AssemblyStats,
}

/// Builds and mines a candidate block
pub struct BlockAssembler {
    config: AssemblerConfig,
    validator: TransactionValidator,
    miner: BlockMiner,
}

impl BlockAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        let miner = BlockMiner::new(config.mining.clone());
        Self {
            config,
            validator: TransactionValidator::new(),
            miner,
        }
    }

    /// Token that cancels the proof-of-work search
    pub fn cancel_token(&self) -> CancelToken {
        self.miner.cancel_token()
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Assemble from a loaded mempool, counting its skipped records
    pub fn assemble_mempool(&self, mempool: Mempool) -> Result<AssembledBlock, AssemblyError> {
        let parse_failures = mempool.failures().len();
        let mut assembled = self.assemble(mempool.into_transactions())?;
        assembled.stats.parse_failures = parse_failures;
        Ok(assembled)
    }

    /// Assemble and mine a block from raw pool transactions
    pub fn assemble(&self, transactions: Vec<Transaction>) -> Result<AssembledBlock, AssemblyError> {
        let loaded = transactions.len();
        let outcome = self.validator.filter(transactions);
        let rejections_by_kind = outcome.rejections_by_kind();
        info!(
            "Validated {} transactions: {} accepted, {} rejected",
            loaded,
            outcome.accepted.len(),
            outcome.rejected.len()
        );

        let fee = total_fee(&outcome.accepted)?;
        let coinbase = Transaction::coinbase(self.config.subsidy, fee, self.config.payout_script.clone())?;
        info!(
            "Coinbase carries {} (subsidy {} + fees {})",
            self.config.subsidy.saturating_add(fee),
            self.config.subsidy,
            fee
        );

        let accepted = outcome.accepted.len();
        let mut block_transactions = Vec::with_capacity(accepted + 1);
        block_transactions.push(coinbase);
        block_transactions.extend(outcome.accepted);

        let merkle_root = Block::calculate_merkle_root(&block_transactions)?;
        let timestamp = match self.config.timestamp {
            Some(ts) => ts,
            None => {
                let now = Utc::now().timestamp();
                u32::try_from(now).map_err(|_| AssemblyError::Timestamp(now))?
            }
        };

        let mut template = BlockHeader::new(
            self.config.previous_block_hash,
            merkle_root,
            timestamp,
            self.config.target,
        );
        template.version = self.config.version;
        info!("Merkle root {} over {} transactions", to_hex(&merkle_root), block_transactions.len());

        let (header, hash, mining) = match self.miner.mine(&template) {
            MiningOutcome::Found {
                header,
                hash,
                stats,
            } => (header, hash, stats),
            MiningOutcome::Exhausted { reason, stats } => {
                return Err(AssemblyError::MiningExhausted {
                    reason,
                    attempts: stats.hash_attempts,
                })
            }
        };

        let block = Block::new(header, block_transactions);
        block.validate()?;

        Ok(AssembledBlock {
            block,
            hash,
            stats: AssemblyStats {
                loaded,
                parse_failures: 0,
                accepted,
                rejected: outcome.rejected.len(),
                rejections_by_kind,
                total_fee: fee,
                mining,
            },
            rejected: outcome.rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionBuilder;
    use crate::crypto::{merkle_root, KeyPair};

    fn config(target: Target) -> AssemblerConfig {
        AssemblerConfig {
            target,
            timestamp: Some(1_700_000_000),
            ..Default::default()
        }
    }

    fn spend(kp: &KeyPair, txid_byte: &str, input: i64, output: i64) -> Transaction {
        TransactionBuilder::new()
            .add_signed_input(kp, &txid_byte.repeat(32), input)
            .unwrap()
            .add_output(output, Script::p2pkh(&[4u8; 20]))
            .build()
    }

    #[test]
    fn test_default_payout_script() {
        let config = AssemblerConfig::default();
        assert_eq!(
            config.payout_script.to_hex(),
            "76a9146085312a9c500ff9cc35b571b0a1e5efb7fb9f1688ac"
        );
        assert_eq!(config.subsidy, 2_500_000);
    }

    #[test]
    fn test_assembles_valid_and_drops_rejected() {
        let kp = KeyPair::generate();
        let good = spend(&kp, "aa", 1000, 900);
        let bad = spend(&kp, "bb", 1000, 0);

        let assembler = BlockAssembler::new(config(Target::from_leading_zero_bits(4)));
        let assembled = assembler.assemble(vec![good.clone(), bad]).unwrap();
        let block = &assembled.block;

        assert_eq!(block.tx_count(), 2);
        assert_eq!(block.transactions[1], good);
        assert_eq!(
            block.coinbase_tx().and_then(Transaction::coinbase_value),
            Some(DEFAULT_SUBSIDY + 100)
        );
        assert_eq!(assembled.stats.accepted, 1);
        assert_eq!(assembled.stats.rejected, 1);
        assert_eq!(assembled.stats.total_fee, 100);
        assert_eq!(assembled.stats.rejections_by_kind.get("non_positive_output"), Some(&1));
        assert!(block.header.meets_target());
        assert_eq!(assembled.hash, block.hash());
    }

    #[test]
    fn test_merkle_root_covers_coinbase_first() {
        let kp = KeyPair::generate();
        let txs = vec![spend(&kp, "aa", 1000, 900), spend(&kp, "cc", 50, 20)];

        let assembled = BlockAssembler::new(config(Target::MAX)).assemble(txs).unwrap();
        let leaves: Vec<Hash256> = assembled.block.transactions.iter().map(Transaction::txid).collect();

        assert!(assembled.block.transactions[0].is_coinbase());
        assert_eq!(merkle_root(&leaves), Some(assembled.block.header.merkle_root));
        assert_eq!(assembled.block.header.nonce, 0);
    }

    #[test]
    fn test_empty_pool_mines_coinbase_only() {
        let assembled = BlockAssembler::new(config(Target::MAX)).assemble(vec![]).unwrap();
        let coinbase = &assembled.block.transactions[0];

        assert_eq!(assembled.block.tx_count(), 1);
        assert_eq!(assembled.block.header.merkle_root, coinbase.txid());
        assert_eq!(coinbase.coinbase_value(), Some(DEFAULT_SUBSIDY));
    }

    #[test]
    fn test_exhausted_mining_is_an_error_not_a_hang() {
        let mut cfg = config(Target([0u8; 32]));
        cfg.mining.max_attempts = Some(100);

        let result = BlockAssembler::new(cfg).assemble(vec![]);
        assert!(matches!(
            result,
            Err(AssemblyError::MiningExhausted {
                reason: StopReason::AttemptLimit,
                attempts: 100
            })
        ));
    }

    #[test]
    fn test_cancelled_assembly() {
        let assembler = BlockAssembler::new(config(Target([0u8; 32])));
        assembler.cancel_token().cancel();
        assert!(matches!(
            assembler.assemble(vec![]),
            Err(AssemblyError::MiningExhausted {
                reason: StopReason::Cancelled,
                ..
            })
        ));
    }

    #[test]
    fn test_mempool_parse_failures_are_counted() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), "[").unwrap();
        let mempool = Mempool::load_dir(temp_dir.path()).unwrap();

        let assembled = BlockAssembler::new(config(Target::MAX))
            .assemble_mempool(mempool)
            .unwrap();
        assert_eq!(assembled.stats.parse_failures, 1);
        assert_eq!(assembled.stats.loaded, 0);
    }
}
