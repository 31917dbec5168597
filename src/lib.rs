//! Quorum Signer: M-of-N multisig transaction signing in Rust
//!
//! This crate provides:
//! - ECDSA keys (secp256k1) and single-key / multisig account addresses
//! - Canonical transaction bodies and signed envelopes
//! - Conversion of single signatures into multisig slots, and slot merging
//! - A quorum signer that fans a request out to remote peers and composes
//!   the first M responses into fully signed transactions
//! - JSON key files
//!
//! # Example
//!
//! ```rust,ignore
//! use quorum_signer::multisig::MultisigAccount;
//! use quorum_signer::signer::{QuorumSigner, SignRequest, Signer, StaticPeers};
//! use std::sync::Arc;
//!
//! let account = MultisigAccount::with_params(2, vec![a, b, c])?;
//! let signer = QuorumSigner::new(account.address(), Arc::new(StaticPeers::new(peers)))
//!     .with_multisig(account);
//!
//! let response = signer.sign(SignRequest::from_transactions(&txns)?).await?;
//! let raw = response.to_raw_batch()?;
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod multisig;
pub mod signer;
pub mod wallet;

// Re-export commonly used types
pub use core::{SignedTransaction, Transaction};
pub use crypto::{Address, KeyPair};
pub use multisig::{MultisigAccount, SigningIdentity};
pub use signer::{LocalSigner, QuorumConfig, QuorumSigner, SignRequest, SignResponse, Signer};
pub use wallet::Wallet;
