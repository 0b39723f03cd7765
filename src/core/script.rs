//! Locking scripts
//!
//! Only the Pay-to-Public-Key-Hash pattern is interpreted:
//! `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`.
//! Any other script is carried as opaque bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::crypto::{from_hex, pubkey_hash_to_address, to_hex};

// =============================================================================
// Opcodes
// =============================================================================

pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_PUSHBYTES_20: u8 = 0x14;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;

/// Serialized length of a P2PKH locking script
pub const P2PKH_SCRIPT_SIZE: usize = 25;

/// Script-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Invalid script hex: {0}")]
    InvalidHex(String),
}

/// Descriptive type of a locking script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    P2PKH,
    Unknown,
}

impl ScriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::P2PKH => "p2pkh",
            ScriptType::Unknown => "unknown",
        }
    }
}

/// A raw locking script, serialized as lowercase hex
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Build a P2PKH locking script for a public key hash
    pub fn p2pkh(pubkey_hash: &[u8; 20]) -> Self {
        let mut bytes = Vec::with_capacity(P2PKH_SCRIPT_SIZE);
        bytes.extend_from_slice(&[OP_DUP, OP_HASH160, OP_PUSHBYTES_20]);
        bytes.extend_from_slice(pubkey_hash);
        bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Self(bytes)
    }

    pub fn from_hex(text: &str) -> Result<Self, ScriptError> {
        from_hex(text)
            .map(Self)
            .map_err(|e| ScriptError::InvalidHex(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Extract the public key hash if this is a P2PKH script
    pub fn p2pkh_hash(&self) -> Option<[u8; 20]> {
        match self.0.as_slice() {
            [OP_DUP, OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG]
                if hash.len() == 20 =>
            {
                hash.try_into().ok()
            }
            _ => None,
        }
    }

    pub fn script_type(&self) -> ScriptType {
        if self.p2pkh_hash().is_some() {
            ScriptType::P2PKH
        } else {
            ScriptType::Unknown
        }
    }

    /// Human-readable assembly, for recognised scripts
    pub fn asm(&self) -> Option<String> {
        self.p2pkh_hash().map(|hash| {
            format!(
                "OP_DUP OP_HASH160 OP_PUSHBYTES_20 {} OP_EQUALVERIFY OP_CHECKSIG",
                to_hex(&hash)
            )
        })
    }

    /// Base58Check address, for recognised scripts
    pub fn address(&self) -> Option<String> {
        self.p2pkh_hash().map(|hash| pubkey_hash_to_address(&hash))
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Script::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYOUT_SCRIPT: &str = "76a9146085312a9c500ff9cc35b571b0a1e5efb7fb9f1688ac";

    #[test]
    fn test_parse_p2pkh() {
        let script = Script::from_hex(PAYOUT_SCRIPT).unwrap();
        assert_eq!(script.script_type(), ScriptType::P2PKH);
        assert_eq!(
            to_hex(&script.p2pkh_hash().unwrap()),
            "6085312a9c500ff9cc35b571b0a1e5efb7fb9f16"
        );
        assert_eq!(
            script.asm().unwrap(),
            "OP_DUP OP_HASH160 OP_PUSHBYTES_20 6085312a9c500ff9cc35b571b0a1e5efb7fb9f16 OP_EQUALVERIFY OP_CHECKSIG"
        );
        assert_eq!(script.address().unwrap(), "19oMRmCWMYuhnP5W61ABrjjxHc6RphZh11");
    }

    #[test]
    fn test_build_round_trips() {
        let hash = [7u8; 20];
        let script = Script::p2pkh(&hash);
        assert_eq!(script.as_bytes().len(), P2PKH_SCRIPT_SIZE);
        assert_eq!(script.p2pkh_hash(), Some(hash));
    }

    #[test]
    fn test_unknown_scripts() {
        let truncated = Script::from_hex(&PAYOUT_SCRIPT[..PAYOUT_SCRIPT.len() - 2]).unwrap();
        assert_eq!(truncated.script_type(), ScriptType::Unknown);
        assert!(truncated.asm().is_none());
        assert!(Script::default().address().is_none());
    }

    #[test]
    fn test_serde_as_hex() {
        let script = Script::from_hex(PAYOUT_SCRIPT).unwrap();
        let json = serde_json::to_string(&script).unwrap();
        assert_eq!(json, format!("\"{}\"", PAYOUT_SCRIPT));
        let back: Script = serde_json::from_str(&json).unwrap();
        assert_eq!(back, script);
        assert!(serde_json::from_str::<Script>("\"xyz\"").is_err());
    }
}
