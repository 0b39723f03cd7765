//! CLI commands for the block assembler
//!
//! Implements the command handlers and the report sink.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::core::{Block, TransactionValidator, ValidationResult};
use crate::crypto::to_hex;
use crate::mining::{AssemblerConfig, BlockAssembler, Mempool};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Report errors
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Write the header line followed by one JSON line per transaction, coinbase first
pub fn write_report<W: Write>(writer: &mut W, block: &Block) -> Result<(), ReportError> {
    writeln!(writer, "{}", block.header)?;
    for tx in &block.transactions {
        serde_json::to_writer(&mut *writer, tx)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the report to `path`, replacing any existing file
pub fn save_report(path: &Path, block: &Block) -> Result<(), ReportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_report(&mut writer, block)
}

/// Assemble, mine and write a block
pub fn cmd_mine(mempool_dir: &Path, output: &Path, config: AssemblerConfig) -> CliResult<()> {
    println!("📬 Loading mempool from {:?}...", mempool_dir);
    let mempool = Mempool::load_dir(mempool_dir)?;

    println!(
        "⛏️  Mining with target {} ({} leading zero bits)",
        config.target,
        config.target.leading_zero_bits()
    );
    let assembler = BlockAssembler::new(config);
    let assembled = assembler.assemble_mempool(mempool)?;
    let stats = &assembled.stats;

    save_report(output, &assembled.block)?;

    println!("\n   Block mined!");
    println!("   ├─ Hash: {}", to_hex(&assembled.hash));
    println!("   ├─ Nonce: {}", assembled.block.header.nonce);
    println!(
        "   ├─ Transactions: {} ({} accepted, {} rejected, {} unreadable)",
        assembled.block.tx_count(),
        stats.accepted,
        stats.rejected,
        stats.parse_failures
    );
    for (kind, count) in &stats.rejections_by_kind {
        println!("   │  └─ {}: {}", kind, count);
    }
    println!("   ├─ Fees: {}", stats.total_fee);
    println!("   ├─ Time: {}ms", stats.mining.time_ms);
    println!("   ├─ Attempts: {}", stats.mining.hash_attempts);
    println!("   └─ Hash rate: {:.2} H/s", stats.mining.hash_rate);
    println!("\n📦 Report written to {:?}", output);

    Ok(())
}

/// Validate every mempool record without mining
pub fn cmd_validate(mempool_dir: &Path) -> CliResult<()> {
    println!("🔍 Validating mempool at {:?}...", mempool_dir);
    let mempool = Mempool::load_dir(mempool_dir)?;
    let validator = TransactionValidator::new();

    let mut accepted = 0;
    for tx in mempool.transactions() {
        match validator.validate(tx) {
            ValidationResult::Accepted => {
                accepted += 1;
                println!("   ✅ {}", tx.txid_hex());
            }
            ValidationResult::Rejected(reason) => {
                println!("   ❌ {} - {}", tx.txid_hex(), reason);
            }
        }
    }
    for failure in mempool.failures() {
        println!("   ⚠️  {}", failure);
    }

    println!(
        "\n   {} accepted, {} rejected, {} unreadable",
        accepted,
        mempool.len() - accepted,
        mempool.failures().len()
    );

    Ok(())
}
