//! Wallet module for key file management

pub mod wallet;

pub use wallet::{KeyStore, Wallet, WalletError};
