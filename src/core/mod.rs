//! Core transaction model
//!
//! This module contains:
//! - Transaction bodies and their canonical encoding
//! - Signed envelopes (single signature, multisig, authorizing address)

pub mod signed;
pub mod transaction;

pub use signed::{
    sign_transaction, verify_single, MultisigSig, MultisigSubsig, PartialSignatureSet,
    SignedTransaction,
};
pub use transaction::{
    format_txn, OnComplete, Transaction, TransactionError, TransactionKind, MIN_TXN_FEE,
    TX_SIGNING_PREFIX,
};
