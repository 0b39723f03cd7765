//! Fee accounting
//!
//! Fee = Σ spent input values − Σ output values. Values are signed and the
//! result is never clamped: malformed pools can produce a negative total,
//! which is passed on to the coinbase unchanged.

use thiserror::Error;

use super::transaction::Transaction;

/// Fee calculation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("Fee total does not fit in 64 bits")]
    Overflow,
}

/// Fee paid by a single transaction
pub fn transaction_fee(tx: &Transaction) -> Result<i64, FeeError> {
    let inputs: i128 = tx.vin.iter().map(|i| i128::from(i.prevout.value)).sum();
    let outputs: i128 = tx.vout.iter().map(|o| i128::from(o.value)).sum();
    i64::try_from(inputs - outputs).map_err(|_| FeeError::Overflow)
}

/// Total fee across a set of accepted transactions
pub fn total_fee(transactions: &[Transaction]) -> Result<i64, FeeError> {
    let total: i128 = transactions
        .iter()
        .flat_map(|tx| {
            let spent = tx.vin.iter().map(|i| i128::from(i.prevout.value));
            let created = tx.vout.iter().map(|o| -i128::from(o.value));
            spent.chain(created)
        })
        .sum();
    i64::try_from(total).map_err(|_| FeeError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::Script;
    use crate::core::transaction::{Outpoint, TxInput, TxOutput};

    fn tx(inputs: &[i64], outputs: &[i64]) -> Transaction {
        Transaction::new(
            inputs
                .iter()
                .map(|&value| TxInput {
                    prevout: Outpoint {
                        txid: "ab".repeat(32),
                        value,
                        scriptpubkey: Script::default(),
                    },
                    ..Default::default()
                })
                .collect(),
            outputs
                .iter()
                .map(|&value| TxOutput::new(value, Script::default()))
                .collect(),
        )
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(total_fee(&[]), Ok(0));
    }

    #[test]
    fn test_single_transaction() {
        let t = tx(&[100], &[40]);
        assert_eq!(transaction_fee(&t), Ok(60));
        assert_eq!(total_fee(&[t]), Ok(60));
    }

    #[test]
    fn test_sums_across_transactions() {
        let txs = vec![tx(&[100, 50], &[40, 10]), tx(&[1000], &[900])];
        assert_eq!(total_fee(&txs), Ok(200));
    }

    #[test]
    fn test_negative_fee_is_not_clamped() {
        assert_eq!(total_fee(&[tx(&[10], &[25])]), Ok(-15));
    }

    #[test]
    fn test_intermediate_sums_do_not_overflow() {
        let txs = vec![tx(&[i64::MAX, i64::MAX], &[i64::MAX, i64::MAX - 3])];
        assert_eq!(total_fee(&txs), Ok(3));
        assert_eq!(total_fee(&[tx(&[i64::MAX], &[-1])]), Err(FeeError::Overflow));
    }
}
