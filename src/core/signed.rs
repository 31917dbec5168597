//! Signed transaction envelopes
//!
//! An envelope wraps a transaction body with either a single signature or a
//! multisig sub-signature set, plus an optional authorizing address used when
//! the sender's authority has been rekeyed to another account.

use crate::core::transaction::{Transaction, TransactionError};
use crate::crypto::{verify_signature, Address, KeyPair, Signature};
use serde::{Deserialize, Serialize};

/// One signer's output for a batch: one entry per transaction, `None` where
/// the signer skipped that transaction
pub type PartialSignatureSet = Vec<Option<Vec<u8>>>;

/// One slot of a multisig signature
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultisigSubsig {
    /// Participant public key, in address form
    pub key: Address,
    /// Signature for this slot, `None` while blank
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<Signature>,
}

impl MultisigSubsig {
    pub fn blank(key: Address) -> Self {
        Self { key, sig: None }
    }

    pub fn is_blank(&self) -> bool {
        self.sig.is_none()
    }
}

/// Multisig signature: account parameters plus one sub-signature per participant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MultisigSig {
    pub version: u8,
    pub threshold: u8,
    pub subsigs: Vec<MultisigSubsig>,
}

impl MultisigSig {
    /// A multisig signature with no parameters and no slots carries nothing
    pub fn is_blank(&self) -> bool {
        self.version == 0 && self.threshold == 0 && self.subsigs.is_empty()
    }

    /// Number of populated slots
    pub fn signed_count(&self) -> usize {
        self.subsigs.iter().filter(|s| !s.is_blank()).count()
    }
}

/// A transaction together with its authorization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msig: Option<MultisigSig>,
    /// Account actually authorizing the transaction when it differs from the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_addr: Option<Address>,
    pub txn: Transaction,
}

impl SignedTransaction {
    /// Wrap a body with a single signature
    pub fn single(txn: Transaction, sig: Signature, auth_addr: Option<Address>) -> Self {
        Self {
            sig: Some(sig),
            msig: None,
            auth_addr,
            txn,
        }
    }

    /// The non-blank multisig signature, if any. It takes priority over `sig`.
    pub fn multisig(&self) -> Option<&MultisigSig> {
        self.msig.as_ref().filter(|m| !m.is_blank())
    }

    pub fn has_multisig(&self) -> bool {
        self.multisig().is_some()
    }

    /// Address whose key produced (or must produce) the signature
    pub fn signer(&self) -> Address {
        self.auth_addr.unwrap_or(self.txn.sender)
    }

    pub fn encode(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransactionError> {
        let stx: Self = serde_json::from_slice(bytes)?;
        stx.txn.validate()?;
        Ok(stx)
    }

    pub fn id(&self) -> Result<String, TransactionError> {
        self.txn.id()
    }
}

/// Sign a transaction with a single key
///
/// The authorizing address is set when the key is not the sender's own.
pub fn sign_transaction(
    key_pair: &KeyPair,
    txn: &Transaction,
) -> Result<SignedTransaction, TransactionError> {
    let signature = key_pair.sign(&txn.signing_bytes()?)?;
    let signer = key_pair.address();
    let auth_addr = (txn.sender != signer).then_some(signer);

    Ok(SignedTransaction::single(txn.clone(), signature, auth_addr))
}

/// Verify a single-signature envelope against its signing identity
pub fn verify_single(stx: &SignedTransaction) -> Result<bool, TransactionError> {
    let Some(signature) = &stx.sig else {
        return Ok(false);
    };

    let public_key = stx.signer().public_key()?;
    Ok(verify_signature(
        &public_key,
        &stx.txn.signing_bytes()?,
        signature,
    )?)
}
