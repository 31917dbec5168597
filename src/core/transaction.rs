//! Transaction bodies
//!
//! A transaction is the unsigned body that every signer in a quorum signs.
//! Its canonical encoding is the JSON serialization of the struct (fields
//! in declaration order, empty optional fields omitted), and the bytes that
//! get signed are that encoding prefixed with a domain tag.

use crate::crypto::{sha256_hex, Address, KeyError};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Domain separation tag prepended to the signing bytes of a transaction
pub const TX_SIGNING_PREFIX: &[u8] = b"TX";

/// Default flat fee for a transaction
pub const MIN_TXN_FEE: u64 = 1000;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Encoding error: {0}")]
    EncodingError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

// =============================================================================
// Transaction
// =============================================================================

/// What an application call does when it completes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnComplete {
    #[default]
    NoOp,
    OptIn,
    CloseOut,
    ClearState,
    Update,
    Delete,
}

/// Type-specific part of a transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    /// Transfer `amount` to `receiver`
    Payment { receiver: Address, amount: u64 },
    /// Call an application
    ApplicationCall {
        application_id: u64,
        #[serde(default)]
        on_complete: OnComplete,
    },
}

impl TransactionKind {
    /// Short type name used in summaries
    pub fn name(&self) -> &'static str {
        match self {
            TransactionKind::Payment { .. } => "pay",
            TransactionKind::ApplicationCall { .. } => "appl",
        }
    }
}

/// An unsigned transaction body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub kind: TransactionKind,
    /// Nominal sender; the account whose authority is exercised
    pub sender: Address,
    pub fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub genesis_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "hex_bytes")]
    pub note: Vec<u8>,
    /// Hands the sender's signing authority to another address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rekey_to: Option<Address>,
}

impl Transaction {
    /// Create a payment transaction with the default fee and a 1000 round window
    pub fn payment(sender: Address, receiver: Address, amount: u64, first_valid: u64) -> Self {
        Self {
            kind: TransactionKind::Payment { receiver, amount },
            sender,
            fee: MIN_TXN_FEE,
            first_valid,
            last_valid: first_valid.saturating_add(1000),
            genesis_id: String::new(),
            note: Vec::new(),
            rekey_to: None,
        }
    }

    /// Create an application call transaction
    pub fn application_call(
        sender: Address,
        application_id: u64,
        on_complete: OnComplete,
        first_valid: u64,
    ) -> Self {
        Self {
            kind: TransactionKind::ApplicationCall {
                application_id,
                on_complete,
            },
            sender,
            fee: MIN_TXN_FEE,
            first_valid,
            last_valid: first_valid.saturating_add(1000),
            genesis_id: String::new(),
            note: Vec::new(),
            rekey_to: None,
        }
    }

    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_validity(mut self, first_valid: u64, last_valid: u64) -> Self {
        self.first_valid = first_valid;
        self.last_valid = last_valid;
        self
    }

    pub fn with_genesis_id(mut self, genesis_id: &str) -> Self {
        self.genesis_id = genesis_id.to_string();
        self
    }

    pub fn with_note(mut self, note: &[u8]) -> Self {
        self.note = note.to_vec();
        self
    }

    pub fn rekey(mut self, rekey_to: Address) -> Self {
        self.rekey_to = Some(rekey_to);
        self
    }

    /// Check structural validity
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.last_valid < self.first_valid {
            return Err(TransactionError::InvalidTransaction(format!(
                "last valid round {} precedes first valid round {}",
                self.last_valid, self.first_valid
            )));
        }
        Ok(())
    }

    /// Canonical encoding of the body
    pub fn encode(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a body from its canonical encoding
    pub fn decode(bytes: &[u8]) -> Result<Self, TransactionError> {
        let txn: Self = serde_json::from_slice(bytes)?;
        txn.validate()?;
        Ok(txn)
    }

    /// The bytes that every signer signs
    pub fn signing_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        let mut bytes = TX_SIGNING_PREFIX.to_vec();
        bytes.extend_from_slice(&self.encode()?);
        Ok(bytes)
    }

    /// Transaction ID (hex SHA-256 of the signing bytes)
    pub fn id(&self) -> Result<String, TransactionError> {
        Ok(sha256_hex(&self.signing_bytes()?))
    }
}

/// Human-readable summary shown before a signer approves a transaction
pub fn format_txn(txn: &Transaction) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Type: {}", txn.kind.name());
    let _ = writeln!(out, "Sender: {}", txn.sender);
    let _ = writeln!(
        out,
        "Validity: {}..{} ({} rounds)",
        txn.first_valid,
        txn.last_valid,
        txn.last_valid.saturating_sub(txn.first_valid).saturating_add(1)
    );

    if let Some(rekey_to) = &txn.rekey_to {
        let _ = writeln!(out, "[!!!] REKEY TO: {}", rekey_to);
    }

    match &txn.kind {
        TransactionKind::Payment { receiver, amount } => {
            let _ = writeln!(out, "Receiver: {}", receiver);
            let _ = writeln!(out, "Amount: {}", amount);
        }
        TransactionKind::ApplicationCall {
            application_id,
            on_complete,
        } => {
            let _ = writeln!(out, "Application ID: {}", application_id);
            let _ = writeln!(out, "On Complete: {:?}", on_complete);
        }
    }

    let _ = writeln!(out, "Fee: {}", txn.fee);
    if !txn.note.is_empty() {
        let _ = writeln!(out, "Note: {}", String::from_utf8_lossy(&txn.note));
    }

    out
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
