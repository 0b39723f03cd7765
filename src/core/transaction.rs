//! Transaction data model
//!
//! Transactions are read from the mempool as JSON records and are
//! immutable afterwards. Each one has a canonical binary encoding which
//! is the only input to its transaction ID, so merkle leaves never depend
//! on how a record happened to be formatted on disk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::script::Script;
use crate::crypto::{double_sha256, from_hex, hash_from_hex, sha256, to_hex, Hash256, HashError, KeyPair};

// =============================================================================
// Constants
// =============================================================================

/// Version of the coinbase transaction
pub const COINBASE_VERSION: i32 = 1;

/// Locktime of the coinbase transaction
pub const COINBASE_LOCKTIME: u32 = 0;

/// Previous-output identifier of the coinbase input
pub const NULL_TXID: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Missing previous transaction id")]
    MissingTxid,
    #[error("Invalid previous transaction id: {0}")]
    InvalidTxid(#[from] HashError),
    #[error("Value overflow")]
    ValueOverflow,
    #[error("Signing failed: {0}")]
    Signing(#[from] crate::crypto::SignatureError),
}

/// Hex (de)serialization for raw byte fields
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Canonical encoding helpers
// =============================================================================

/// Bitcoin-style compact size prefix
fn write_compact_size(out: &mut Vec<u8>, n: usize) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&(n as u64).to_le_bytes());
        }
    }
}

fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(out, bytes.len());
    out.extend_from_slice(bytes);
}

// =============================================================================
// Transaction Input
// =============================================================================

/// The previous output an input spends
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outpoint {
    /// Previous transaction id, as displayed hex
    #[serde(default)]
    pub txid: String,
    /// Value of the spent output in minimal units
    #[serde(default)]
    pub value: i64,
    /// Locking script of the spent output
    #[serde(default, skip_serializing_if = "Script::is_empty")]
    pub scriptpubkey: Script,
}

impl Outpoint {
    /// Raw bytes of the previous transaction id
    pub fn txid_bytes(&self) -> Result<Hash256, TransactionError> {
        if self.txid.is_empty() {
            return Err(TransactionError::MissingTxid);
        }
        Ok(hash_from_hex(&self.txid)?)
    }
}

/// Transaction input
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxInput {
    pub prevout: Outpoint,
    /// 65-byte compact recoverable signature (r || s || recovery id)
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Vec::is_empty")]
    pub scriptsig: Vec<u8>,
    /// Optional explicit public key (hex, compressed or uncompressed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
}

impl TxInput {
    /// Digest the input's signature commits to: SHA-256 of the raw previous txid
    pub fn signature_digest(&self) -> Result<Hash256, TransactionError> {
        Ok(sha256(&self.prevout.txid_bytes()?))
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
///
/// Only `value` and `scriptpubkey` are authoritative; the remaining fields
/// describe the script for readers and are regenerated by [`TxOutput::new`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxOutput {
    #[serde(default)]
    pub scriptpubkey: Script,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scriptpubkey_asm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scriptpubkey_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scriptpubkey_address: Option<String>,
    pub value: i64,
}

impl TxOutput {
    /// Create an output, deriving the descriptive fields from the script
    pub fn new(value: i64, scriptpubkey: Script) -> Self {
        Self {
            scriptpubkey_asm: scriptpubkey.asm(),
            scriptpubkey_type: Some(scriptpubkey.script_type().as_str().to_string()),
            scriptpubkey_address: scriptpubkey.address(),
            scriptpubkey,
            value,
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A pool transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub locktime: u32,
    /// Inputs, in consensus order
    #[serde(default)]
    pub vin: Vec<TxInput>,
    /// Outputs, in consensus order
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(vin: Vec<TxInput>, vout: Vec<TxOutput>) -> Self {
        Self {
            version: 1,
            locktime: 0,
            vin,
            vout,
        }
    }

    /// Create the coinbase transaction
    ///
    /// The single input spends the null outpoint and carries `subsidy + fee`
    /// as its value. The payout output is created with value 0: the reward is
    /// recorded on the input side only, so reading the output value yields 0.
    pub fn coinbase(subsidy: i64, fee: i64, payout_script: Script) -> Result<Self, TransactionError> {
        let reward = subsidy
            .checked_add(fee)
            .ok_or(TransactionError::ValueOverflow)?;

        let input = TxInput {
            prevout: Outpoint {
                txid: NULL_TXID.to_string(),
                value: reward,
                scriptpubkey: Script::default(),
            },
            scriptsig: Vec::new(),
            pubkey: None,
        };

        Ok(Self {
            version: COINBASE_VERSION,
            locktime: COINBASE_LOCKTIME,
            vin: vec![input],
            vout: vec![TxOutput::new(0, payout_script)],
        })
    }

    /// Check if this transaction has the coinbase shape
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].prevout.txid == NULL_TXID
    }

    /// Value carried by the coinbase input (subsidy + fees)
    pub fn coinbase_value(&self) -> Option<i64> {
        if self.is_coinbase() {
            Some(self.vin[0].prevout.value)
        } else {
            None
        }
    }

    /// Canonical binary encoding
    ///
    /// version (i32 LE) | inputs | outputs | locktime (u32 LE), with
    /// compact-size counts and length-prefixed byte strings. Descriptive
    /// output fields are not encoded.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());

        write_compact_size(&mut out, self.vin.len());
        for input in &self.vin {
            let txid = from_hex(&input.prevout.txid)
                .unwrap_or_else(|_| input.prevout.txid.as_bytes().to_vec());
            write_var_bytes(&mut out, &txid);
            out.extend_from_slice(&input.prevout.value.to_le_bytes());
            write_var_bytes(&mut out, input.prevout.scriptpubkey.as_bytes());
            write_var_bytes(&mut out, &input.scriptsig);
            write_var_bytes(&mut out, input.pubkey.as_deref().unwrap_or("").as_bytes());
        }

        write_compact_size(&mut out, self.vout.len());
        for output in &self.vout {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_var_bytes(&mut out, output.scriptpubkey.as_bytes());
        }

        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    /// Transaction ID: double SHA-256 of the canonical encoding
    pub fn txid(&self) -> Hash256 {
        double_sha256(&self.serialize())
    }

    pub fn txid_hex(&self) -> String {
        to_hex(&self.txid())
    }
}

// =============================================================================
// Transaction Builder
// =============================================================================

/// Builder for constructing signed transactions
#[derive(Default)]
pub struct TransactionBuilder {
    vin: Vec<TxInput>,
    vout: Vec<TxOutput>,
    locktime: u32,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input spending `txid` that is locked to `key_pair`'s P2PKH script, and sign it
    pub fn add_signed_input(
        mut self,
        key_pair: &KeyPair,
        txid: &str,
        value: i64,
    ) -> Result<Self, TransactionError> {
        let mut input = TxInput {
            prevout: Outpoint {
                txid: txid.to_string(),
                value,
                scriptpubkey: Script::p2pkh(&key_pair.pubkey_hash()),
            },
            scriptsig: Vec::new(),
            pubkey: Some(key_pair.public_key_hex()),
        };
        let digest = input.signature_digest()?;
        input.scriptsig = key_pair.sign_recoverable(&digest)?.to_vec();
        self.vin.push(input);
        Ok(self)
    }

    /// Add a raw input, unsigned
    pub fn add_input(mut self, input: TxInput) -> Self {
        self.vin.push(input);
        self
    }

    pub fn add_output(mut self, value: i64, scriptpubkey: Script) -> Self {
        self.vout.push(TxOutput::new(value, scriptpubkey));
        self
    }

    pub fn locktime(mut self, locktime: u32) -> Self {
        self.locktime = locktime;
        self
    }

    pub fn build(self) -> Transaction {
        let mut tx = Transaction::new(self.vin, self.vout);
        tx.locktime = self.locktime;
        tx
    }
}
