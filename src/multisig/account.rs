//! Multisig account descriptors
//!
//! A multisig account is an ordered list of participant keys plus a version
//! and a threshold. Key order is part of the account's identity: it fixes
//! each participant's slot and feeds the address digest.

use crate::core::{MultisigSig, TransactionError};
use crate::crypto::{sha256_parts, Address, KeyError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Current multisig descriptor version
pub const MULTISIG_VERSION: u8 = 1;

/// Domain prefix of the multisig address digest
const MULTISIG_ADDRESS_DOMAIN: &[u8] = b"MultisigAddr";

/// Errors related to multisig operations
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Invalid multisig version: {0}")]
    InvalidVersion(u8),
    #[error("Multisig account needs at least one participant")]
    NoSigners,
    #[error("Duplicate participant key: {0}")]
    DuplicateSigner(Address),
    #[error("Signer {0} is not a participant of the multisig account")]
    InvalidParticipant(Address),
    #[error("Envelope carries no signature to convert")]
    MissingSignature,
    #[error("Conflicting signatures for slot {slot} ({key})")]
    ConflictingSignature { slot: usize, key: Address },
    #[error("Incompatible merge: {0}")]
    IncompatibleMerge(String),
    #[error("Batch length mismatch: batch {batch} has {got} entries, expected {expected}")]
    BatchLengthMismatch {
        batch: usize,
        got: usize,
        expected: usize,
    },
    #[error("Transaction {index} of the batch: {source}")]
    InBatch {
        index: usize,
        #[source]
        source: Box<MultisigError>,
    },
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// An M-of-N multisig account
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultisigAccount {
    version: u8,
    threshold: u8,
    keys: Vec<Address>,
}

impl MultisigAccount {
    /// Create a new multisig account
    ///
    /// # Arguments
    /// * `version` - Descriptor version (must be non-zero)
    /// * `threshold` - Minimum signatures required (M)
    /// * `keys` - Participant addresses in slot order (N)
    ///
    /// # Errors
    /// Returns error if the threshold is zero or exceeds the participant
    /// count, a key is repeated, or a key is not a single-key address
    pub fn new(version: u8, threshold: u8, keys: Vec<Address>) -> Result<Self, MultisigError> {
        if version == 0 {
            return Err(MultisigError::InvalidVersion(version));
        }

        if keys.is_empty() {
            return Err(MultisigError::NoSigners);
        }

        if threshold == 0 {
            return Err(MultisigError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            ));
        }

        if threshold as usize > keys.len() {
            return Err(MultisigError::InvalidThreshold(format!(
                "threshold {} exceeds signer count {}",
                threshold,
                keys.len()
            )));
        }

        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            key.public_key()?;
            if !seen.insert(*key) {
                return Err(MultisigError::DuplicateSigner(*key));
            }
        }

        Ok(Self {
            version,
            threshold,
            keys,
        })
    }

    /// Create an account with the current descriptor version
    pub fn with_params(threshold: u8, keys: Vec<Address>) -> Result<Self, MultisigError> {
        Self::new(MULTISIG_VERSION, threshold, keys)
    }

    /// Recover the account described by a multisig signature
    pub fn from_msig(msig: &MultisigSig) -> Result<Self, MultisigError> {
        let keys = msig.subsigs.iter().map(|s| s.key).collect();
        Self::new(msig.version, msig.threshold, keys)
    }

    /// Deterministic account address
    ///
    /// Address = 0x05 || SHA256("MultisigAddr" || version || threshold || key_1 || .. || key_N)
    pub fn address(&self) -> Address {
        let mut parts: Vec<&[u8]> = Vec::with_capacity(self.keys.len() + 3);
        let params = [self.version, self.threshold];
        parts.push(MULTISIG_ADDRESS_DOMAIN);
        parts.push(&params);
        for key in &self.keys {
            parts.push(key.as_bytes());
        }
        Address::multisig(sha256_parts(&parts))
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Get the threshold (M)
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Participant keys in slot order
    pub fn keys(&self) -> &[Address] {
        &self.keys
    }

    /// Get the total signer count (N)
    pub fn signer_count(&self) -> usize {
        self.keys.len()
    }

    /// Slot index of a participant
    pub fn slot_of(&self, key: &Address) -> Option<usize> {
        self.keys.iter().position(|k| k.as_bytes() == key.as_bytes())
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.keys.len())
    }
}

/// Parse a separator-delimited list of addresses; an empty string yields none
pub fn parse_addrs(addrs: &str, sep: &str) -> Result<Vec<Address>, KeyError> {
    if addrs.trim().is_empty() {
        return Ok(Vec::new());
    }

    addrs.split(sep).map(|addr| addr.trim().parse()).collect()
}

/// The identity a signer acts as: one key, or a multisig account
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SigningIdentity {
    Single(Address),
    Multisig(MultisigAccount),
}

impl SigningIdentity {
    /// Resolve a participant list and threshold
    ///
    /// One address is a plain account; several form a multisig account.
    pub fn resolve(addrs: Vec<Address>, threshold: u8) -> Result<Self, MultisigError> {
        if threshold == 0 {
            return Err(MultisigError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            ));
        }

        match addrs.len() {
            0 => Err(MultisigError::NoSigners),
            1 if threshold == 1 => Ok(SigningIdentity::Single(addrs[0])),
            n if n < threshold as usize => Err(MultisigError::InvalidThreshold(format!(
                "number of addresses {} is less than the threshold {}",
                n, threshold
            ))),
            _ => Ok(SigningIdentity::Multisig(MultisigAccount::with_params(
                threshold, addrs,
            )?)),
        }
    }

    pub fn address(&self) -> Address {
        match self {
            SigningIdentity::Single(address) => *address,
            SigningIdentity::Multisig(account) => account.address(),
        }
    }

    pub fn multisig(&self) -> Option<&MultisigAccount> {
        match self {
            SigningIdentity::Single(_) => None,
            SigningIdentity::Multisig(account) => Some(account),
        }
    }
}
