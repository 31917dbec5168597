//! Signers
//!
//! A [`Signer`] takes a batch sign request and returns the signed batch.
//! Callers do not know whether signing happens in-process
//! ([`LocalSigner`]) or is mediated by a quorum of remote peers
//! ([`QuorumSigner`]).

pub mod local;
pub mod peer;
pub mod quorum;

use crate::core::{PartialSignatureSet, SignedTransaction, Transaction, TransactionError};
use crate::crypto::{Address, KeyError};
use crate::multisig::MultisigError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::{LocalSigner, LocalSignerOptions};
pub use peer::{
    LocalPeer, PeerError, PeerHandle, PeerProvider, PeerRegistry, PeerTransport, StaticPeers,
};
pub use quorum::{fill_missing_auth_addr, QuorumConfig, QuorumSigner};

/// Signing errors
#[derive(Error, Debug)]
pub enum SignerError {
    #[error("Peer {address} returned {got} partial transactions, expected {expected}")]
    PartialCountMismatch {
        address: Address,
        got: usize,
        expected: usize,
    },
    #[error("Peer {address} failed to sign: {source}")]
    Peer {
        address: Address,
        #[source]
        source: PeerError,
    },
    #[error("Quorum unreachable: {got} of {needed} signers responded")]
    QuorumUnreachable { got: usize, needed: usize },
    #[error("Failed to convert transaction {index} from peer {address}: {source}")]
    Convert {
        address: Address,
        index: usize,
        #[source]
        source: MultisigError,
    },
    #[error("Base64 decoding error: {0}")]
    Base64Error(#[from] base64::DecodeError),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Multisig error: {0}")]
    MultisigError(#[from] MultisigError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// One entry of a sign request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignRequestItem {
    /// Base64 of the encoded transaction body
    pub txn: String,
    /// Which address should sign this entry, for peers holding several
    #[serde(
        rename = "authAddr",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_addr: Option<String>,
}

/// An ordered batch of transactions to sign
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SignRequest {
    pub txns: Vec<SignRequestItem>,
}

impl SignRequest {
    /// Build a request from transaction bodies
    pub fn from_transactions(txns: &[Transaction]) -> Result<Self, SignerError> {
        let txns = txns
            .iter()
            .map(|txn| -> Result<SignRequestItem, SignerError> {
                Ok(SignRequestItem {
                    txn: BASE64.encode(txn.encode()?),
                    auth_addr: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { txns })
    }

    /// Decode the transaction bodies in batch order
    pub fn transactions(&self) -> Result<Vec<Transaction>, SignerError> {
        self.txns
            .iter()
            .map(|item| -> Result<Transaction, SignerError> {
                Ok(Transaction::decode(&BASE64.decode(&item.txn)?)?)
            })
            .collect()
    }

    /// Copy of the request with every entry addressed to `address`
    pub fn stamped(&self, address: &Address) -> Self {
        let auth_addr = Some(address.to_string());
        Self {
            txns: self
                .txns
                .iter()
                .map(|item| SignRequestItem {
                    txn: item.txn.clone(),
                    auth_addr: auth_addr.clone(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.txns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }
}

/// Signed batch, index-aligned with the request; `None` marks a skipped entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SignResponse {
    pub result: Vec<Option<String>>,
}

impl SignResponse {
    pub fn from_partials(partials: &PartialSignatureSet) -> Self {
        Self {
            result: partials
                .iter()
                .map(|entry| entry.as_ref().map(|bytes| BASE64.encode(bytes)))
                .collect(),
        }
    }

    /// Decode the transport encoding back into raw envelopes
    pub fn to_partials(&self) -> Result<PartialSignatureSet, SignerError> {
        self.result
            .iter()
            .map(|entry| -> Result<Option<Vec<u8>>, SignerError> {
                match entry {
                    Some(b64) if !b64.is_empty() => Ok(Some(BASE64.decode(b64)?)),
                    _ => Ok(None),
                }
            })
            .collect()
    }

    /// Decode every signed entry
    pub fn signed_transactions(&self) -> Result<Vec<Option<SignedTransaction>>, SignerError> {
        self.to_partials()?
            .iter()
            .map(|entry| -> Result<Option<SignedTransaction>, SignerError> {
                match entry {
                    Some(bytes) => Ok(Some(SignedTransaction::decode(bytes)?)),
                    None => Ok(None),
                }
            })
            .collect()
    }

    /// Raw concatenated envelopes, ready for submission
    pub fn to_raw_batch(&self) -> Result<Vec<u8>, SignerError> {
        Ok(self.to_partials()?.into_iter().flatten().flatten().collect())
    }
}

/// Anything that can sign a batch of transactions
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign a batch; the response is index-aligned with the request
    async fn sign(&self, request: SignRequest) -> Result<SignResponse, SignerError>;

    /// Address of the identity this signer acts as
    fn address(&self) -> Address;
}
