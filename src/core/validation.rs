//! Transaction validation
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. `vin` and `vout` are non-empty
//! 2. every input names a previous transaction
//! 3. every input's signature verifies against its claimed key
//! 4. every output value is strictly positive
//!
//! A transaction is accepted only after every input and every output has
//! passed.

use log::{debug, warn};
use secp256k1::PublicKey;
use std::collections::BTreeMap;
use std::fmt;

use super::transaction::{Transaction, TxInput};
use crate::crypto::{public_key_from_hex, verify_recoverable, ClaimedKey, SignatureError};

/// Why a transaction was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Structural problem (empty vin/vout, missing or bad txid, no key claim)
    Malformed(String),
    /// Signature recovery or verification failed for input `input`
    SignatureInvalid { input: usize, source: SignatureError },
    /// Output `index` has a value ≤ 0
    NonPositiveOutput { index: usize, value: i64 },
}

impl RejectReason {
    /// Short stable label, used for counting rejections
    pub fn kind(&self) -> &'static str {
        match self {
            RejectReason::Malformed(_) => "malformed",
            RejectReason::SignatureInvalid { .. } => "signature_invalid",
            RejectReason::NonPositiveOutput { .. } => "non_positive_output",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Malformed(msg) => write!(f, "malformed transaction: {}", msg),
            RejectReason::SignatureInvalid { input, source } => {
                write!(f, "invalid signature on input {}: {}", input, source)
            }
            RejectReason::NonPositiveOutput { index, value } => {
                write!(f, "output {} has non-positive value {}", index, value)
            }
        }
    }
}

/// Outcome of validating one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Accepted,
    Rejected(RejectReason),
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationResult::Accepted)
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            ValidationResult::Accepted => None,
            ValidationResult::Rejected(reason) => Some(reason),
        }
    }
}

impl From<Result<(), RejectReason>> for ValidationResult {
    fn from(result: Result<(), RejectReason>) -> Self {
        match result {
            Ok(()) => ValidationResult::Accepted,
            Err(reason) => ValidationResult::Rejected(reason),
        }
    }
}

/// Accepted and rejected transactions from one filtering pass
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Accepted transactions, in input order
    pub accepted: Vec<Transaction>,
    /// Rejected transactions with their txid (hex) and reason
    pub rejected: Vec<(String, RejectReason)>,
}

impl FilterOutcome {
    /// Rejection counts keyed by [`RejectReason::kind`]
    pub fn rejections_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for (_, reason) in &self.rejected {
            *counts.entry(reason.kind()).or_insert(0) += 1;
        }
        counts
    }
}

/// Stateless validator for pool transactions
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionValidator;

impl TransactionValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a single transaction
    pub fn validate(&self, tx: &Transaction) -> ValidationResult {
        self.check(tx).into()
    }

    /// Validate a batch, keeping accepted transactions in their original order
    pub fn filter(&self, transactions: Vec<Transaction>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();

        for tx in transactions {
            match self.check(&tx) {
                Ok(()) => {
                    debug!("Accepted transaction {}", tx.txid_hex());
                    outcome.accepted.push(tx);
                }
                Err(reason) => {
                    let txid = tx.txid_hex();
                    warn!("Rejected transaction {}: {}", txid, reason);
                    outcome.rejected.push((txid, reason));
                }
            }
        }

        outcome
    }

    fn check(&self, tx: &Transaction) -> Result<(), RejectReason> {
        if tx.vin.is_empty() {
            return Err(RejectReason::Malformed("no inputs".to_string()));
        }
        if tx.vout.is_empty() {
            return Err(RejectReason::Malformed("no outputs".to_string()));
        }

        for (index, input) in tx.vin.iter().enumerate() {
            if input.prevout.txid.is_empty() {
                return Err(RejectReason::Malformed(format!(
                    "input {} has no previous transaction id",
                    index
                )));
            }
        }

        for (index, input) in tx.vin.iter().enumerate() {
            Self::check_signature(index, input)?;
        }

        if let Some((index, output)) = tx.vout.iter().enumerate().find(|(_, o)| o.value <= 0) {
            return Err(RejectReason::NonPositiveOutput {
                index,
                value: output.value,
            });
        }

        Ok(())
    }

    /// Verify one input's signature against the digest of its previous txid
    fn check_signature(index: usize, input: &TxInput) -> Result<PublicKey, RejectReason> {
        let digest = input
            .signature_digest()
            .map_err(|e| RejectReason::Malformed(format!("input {}: {}", index, e)))?;
        let claimed = Self::claimed_key(index, input)?;

        verify_recoverable(&digest, &input.scriptsig, &claimed).map_err(|source| {
            RejectReason::SignatureInvalid {
                input: index,
                source,
            }
        })
    }

    /// Resolve which key the input claims to be signed by
    ///
    /// An explicit pubkey wins, but must hash to the P2PKH script hash when
    /// the spent output is P2PKH.
    fn claimed_key(index: usize, input: &TxInput) -> Result<ClaimedKey, RejectReason> {
        let script_hash = input.prevout.scriptpubkey.p2pkh_hash();

        match (&input.pubkey, script_hash) {
            (Some(hex_key), script_hash) => {
                let key = public_key_from_hex(hex_key).map_err(|source| {
                    RejectReason::SignatureInvalid {
                        input: index,
                        source,
                    }
                })?;
                if let Some(hash) = script_hash {
                    if !ClaimedKey::PubKeyHash(hash).matches(&key) {
                        return Err(RejectReason::SignatureInvalid {
                            input: index,
                            source: SignatureError::KeyMismatch,
                        });
                    }
                }
                Ok(ClaimedKey::PublicKey(key))
            }
            (None, Some(hash)) => Ok(ClaimedKey::PubKeyHash(hash)),
            (None, None) => Err(RejectReason::Malformed(format!(
                "input {} has neither a public key nor a P2PKH previous script",
                index
            ))),
        }
    }
}
