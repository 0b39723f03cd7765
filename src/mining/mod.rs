//! Mining module: transaction pool, proof-of-work search and block assembly

pub mod assembler;
pub mod mempool;
pub mod miner;

pub use assembler::{
    AssembledBlock, AssemblerConfig, AssemblyError, AssemblyStats, BlockAssembler,
    DEFAULT_SUBSIDY,
};
pub use mempool::{Mempool, MempoolError, MempoolStats};
pub use miner::{BlockMiner, CancelToken, MiningConfig, MiningOutcome, MiningStats, StopReason};
