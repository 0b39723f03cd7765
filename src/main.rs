//! Block Assembler CLI Application
//!
//! Validates a mempool directory and mines a candidate block from it.

use block_assembler::cli;
use block_assembler::core::{Script, Target};
use block_assembler::mining::{AssemblerConfig, MiningConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "block-assembler")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Assemble and mine a candidate block from a mempool", long_about = None)]
struct Cli {
    /// Directory of mempool transaction records
    #[arg(short, long, global = true, default_value = "mempool")]
    mempool: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and mine a block, then write the report
    Mine {
        /// Report file
        #[arg(short, long, default_value = "output.txt")]
        output: PathBuf,

        /// Block subsidy in minimal units
        #[arg(short, long)]
        subsidy: Option<i64>,

        /// Target as 64 hex characters
        #[arg(short, long, conflicts_with = "zero_bits")]
        target: Option<String>,

        /// Target expressed as a number of leading zero bits
        #[arg(short, long)]
        zero_bits: Option<u32>,

        /// Coinbase payout script as hex
        #[arg(long)]
        payout_script: Option<String>,

        /// Stop after this many nonces
        #[arg(long)]
        max_attempts: Option<u64>,

        /// Stop after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Worker threads searching the nonce space
        #[arg(short, long, default_value = "1")]
        workers: usize,

        /// Fixed header timestamp (defaults to now)
        #[arg(long)]
        timestamp: Option<u32>,
    },

    /// Validate mempool records without mining
    Validate,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mine {
            output,
            subsidy,
            target,
            zero_bits,
            payout_script,
            max_attempts,
            timeout_secs,
            workers,
            timestamp,
        } => {
            let mut config = AssemblerConfig {
                timestamp,
                mining: MiningConfig {
                    max_attempts,
                    timeout: timeout_secs.map(Duration::from_secs),
                    workers: workers.max(1),
                    ..Default::default()
                },
                ..Default::default()
            };
            if let Some(subsidy) = subsidy {
                config.subsidy = subsidy;
            }
            if let Some(hex) = target {
                config.target = Target::from_hex(&hex)?;
            } else if let Some(bits) = zero_bits {
                config.target = Target::from_leading_zero_bits(bits);
            }
            if let Some(hex) = payout_script {
                config.payout_script = Script::from_hex(&hex)?;
            }

            cli::cmd_mine(&cli.mempool, &output, config)?;
        }

        Commands::Validate => {
            cli::cmd_validate(&cli.mempool)?;
        }
    }

    Ok(())
}
