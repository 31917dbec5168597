//! Cryptographic primitives
//!
//! This module provides:
//! - SHA-256 hashing
//! - ECDSA key management (secp256k1)
//! - Account addresses (single-key and multisig)

pub mod address;
pub mod hash;
pub mod keys;

pub use address::{Address, ADDRESS_LEN, MULTISIG_ADDRESS_TAG};
pub use hash::{double_sha256, sha256, sha256_hex, sha256_parts};
pub use keys::{
    public_key_from_hex, sign_message, verify_signature, KeyError, KeyPair, Signature,
    SIGNATURE_LEN,
};
