//! Multi-signature accounts, slot conversion and merging
//!
//! An M-of-N account is an ordered list of N participant keys; a multisig
//! envelope carries one sub-signature slot per participant. Signers may
//! return plain single-signature envelopes, which are converted into their
//! slot before the contributions are merged.
//!
//! # Example
//!
//! ```ignore
//! use quorum_signer::multisig::{merge, sign_multisig_transaction, to_multisig_slot, MultisigAccount};
//!
//! // Create a 2-of-3 account
//! let account = MultisigAccount::with_params(2, vec![addr_a, addr_b, addr_c])?;
//!
//! // A signs natively, B returns a plain signature
//! let a = sign_multisig_transaction(&key_a, &account, &txn)?;
//! let b = to_multisig_slot(&sign_transaction(&key_b, &txn)?, &account)?;
//!
//! // Both slots are filled; ready to broadcast
//! let signed = merge(&[a, b])?;
//! ```

pub mod account;
pub mod convert;
pub mod merge;
pub mod sign;

pub use account::{parse_addrs, MultisigAccount, MultisigError, SigningIdentity, MULTISIG_VERSION};
pub use convert::{convert_encoded, single_slot, to_multisig_slot};
pub use merge::{merge, merge_batches, merge_encoded};
pub use sign::{sign_multisig_transaction, verify_multisig};
