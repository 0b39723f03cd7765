//! Transaction pool
//!
//! Holds the pending transactions a block is assembled from. A pool is
//! usually loaded from a directory of JSON records, one transaction per
//! file. A record that cannot be read or parsed is skipped and kept as a
//! failure; only an unreadable directory aborts the load.

use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::Transaction;

/// Mempool errors
#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("Cannot read mempool directory {path:?}: {source}")]
    Directory { path: PathBuf, source: io::Error },
    #[error("Cannot read record {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Cannot parse record {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Mempool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MempoolStats {
    /// Records parsed into transactions
    pub loaded: usize,
    /// Records skipped because they could not be read or parsed
    pub failed: usize,
}

/// Ordered pool of pending transactions
#[derive(Debug, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
    failures: Vec<MempoolError>,
}

impl Mempool {
    /// Create an empty mempool
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mempool from already materialised transactions
    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            failures: Vec::new(),
        }
    }

    /// Load every file in `dir`, in file name order
    pub fn load_dir(dir: &Path) -> Result<Self, MempoolError> {
        let directory_error = |source| MempoolError::Directory {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(directory_error)? {
            let path = entry.map_err(directory_error)?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut mempool = Self::new();
        for path in paths {
            match Self::read_record(&path) {
                Ok(tx) => {
                    debug!("Loaded {:?}", path);
                    mempool.transactions.push(tx);
                }
                Err(e) => {
                    warn!("Skipping mempool record: {}", e);
                    mempool.failures.push(e);
                }
            }
        }

        let stats = mempool.stats();
        info!(
            "Loaded {} transactions from {:?} ({} skipped)",
            stats.loaded, dir, stats.failed
        );
        Ok(mempool)
    }

    fn read_record(path: &Path) -> Result<Transaction, MempoolError> {
        let data = fs::read_to_string(path).map_err(|source| MempoolError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| MempoolError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Add a transaction at the end of the pool
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    /// Records that were skipped during loading
    pub fn failures(&self) -> &[MempoolError] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn stats(&self) -> MempoolStats {
        MempoolStats {
            loaded: self.transactions.len(),
            failed: self.failures.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Script, TxOutput};

    fn write_tx(dir: &Path, name: &str, value: i64) -> Transaction {
        let tx = Transaction::new(vec![], vec![TxOutput::new(value, Script::default())]);
        fs::write(dir.join(name), serde_json::to_string(&tx).unwrap()).unwrap();
        tx
    }

    #[test]
    fn test_load_dir_in_name_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let b = write_tx(temp_dir.path(), "b.json", 2);
        let a = write_tx(temp_dir.path(), "a.json", 1);

        let mempool = Mempool::load_dir(temp_dir.path()).unwrap();

        assert_eq!(mempool.transactions(), &[a, b]);
        assert_eq!(mempool.stats(), MempoolStats { loaded: 2, failed: 0 });
    }

    #[test]
    fn test_bad_record_does_not_abort_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_tx(temp_dir.path(), "good.json", 1);
        fs::write(temp_dir.path().join("bad.json"), "{ not json").unwrap();
        fs::write(temp_dir.path().join("wrong.json"), r#"{"vin": 5}"#).unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();

        let mempool = Mempool::load_dir(temp_dir.path()).unwrap();

        assert_eq!(mempool.len(), 1);
        assert_eq!(mempool.failures().len(), 2);
        assert!(mempool
            .failures()
            .iter()
            .all(|e| matches!(e, MempoolError::Parse { .. })));
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            Mempool::load_dir(&missing),
            Err(MempoolError::Directory { .. })
        ));
    }

    #[test]
    fn test_in_memory_pool() {
        let mut mempool = Mempool::new();
        assert!(mempool.is_empty());
        mempool.add_transaction(Transaction::default());
        assert_eq!(mempool.len(), 1);
        assert_eq!(mempool.into_transactions().len(), 1);
    }
}
