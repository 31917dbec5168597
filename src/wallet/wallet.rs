//! Key files
//!
//! A wallet is one signing key persisted as JSON, optionally labelled.
//! A [`KeyStore`] is a directory of such files named by address.

use crate::crypto::{Address, KeyError, KeyPair};
use crate::signer::{LocalSigner, LocalSignerOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Key file {path} holds the key for {derived}, but claims {stored}")]
    AddressMismatch {
        path: PathBuf,
        stored: String,
        derived: Address,
    },
    #[error("No key file for {0}")]
    NotFound(Address),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// On-disk form of a wallet
#[derive(Debug, Serialize, Deserialize)]
struct WalletData {
    private_key_hex: String,
    address: String,
    label: Option<String>,
    created_at: DateTime<Utc>,
}

/// A signing key with its metadata
#[derive(Debug, Clone)]
pub struct Wallet {
    key_pair: KeyPair,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Self {
        Self::from_key_pair(KeyPair::generate())
    }

    pub fn with_label(label: &str) -> Self {
        let mut wallet = Self::new();
        wallet.label = Some(label.to_string());
        wallet
    }

    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        Self {
            key_pair,
            label: None,
            created_at: Utc::now(),
        }
    }

    /// Import a wallet from a private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        Ok(Self::from_key_pair(KeyPair::from_private_key_hex(
            private_key_hex,
        )?))
    }

    pub fn address(&self) -> Address {
        self.key_pair.address()
    }

    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// An in-process signer backed by this wallet's key
    pub fn signer(&self, options: LocalSignerOptions) -> LocalSigner {
        LocalSigner::with_options(self.key_pair.clone(), options)
    }

    /// Save wallet to file
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            private_key_hex: self.private_key(),
            address: self.address().to_string(),
            label: self.label.clone(),
            created_at: self.created_at,
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        log::debug!("Saved key for {} to {}", self.address(), path.display());
        Ok(())
    }

    /// Load wallet from file; the stored address must match the key
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: WalletData = serde_json::from_str(&json)?;

        let key_pair = KeyPair::from_private_key_hex(&data.private_key_hex)?;
        let derived = key_pair.address();
        if derived.to_string() != data.address {
            return Err(WalletError::AddressMismatch {
                path: path.to_path_buf(),
                stored: data.address,
                derived,
            });
        }

        Ok(Self {
            key_pair,
            label: data.label,
            created_at: data.created_at,
        })
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// A directory of key files named `<address>.json`
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: &Path) -> Result<Self, WalletError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, address: &Address) -> PathBuf {
        self.dir.join(format!("{}.json", address))
    }

    /// Create and save a new wallet
    pub fn create(&self, label: Option<&str>) -> Result<Wallet, WalletError> {
        let wallet = match label {
            Some(l) => Wallet::with_label(l),
            None => Wallet::new(),
        };
        wallet.save(&self.path_for(&wallet.address()))?;
        Ok(wallet)
    }

    /// Load every readable key file; unreadable files are skipped
    pub fn load_all(&self) -> Result<Vec<Wallet>, WalletError> {
        let mut wallets = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();

            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match Wallet::load(&path) {
                    Ok(wallet) => wallets.push(wallet),
                    Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
                }
            }
        }

        wallets.sort_by_key(|w| w.created_at);
        Ok(wallets)
    }

    pub fn addresses(&self) -> Result<Vec<Address>, WalletError> {
        Ok(self.load_all()?.iter().map(Wallet::address).collect())
    }

    pub fn load(&self, address: &Address) -> Result<Wallet, WalletError> {
        let path = self.path_for(address);
        if !path.exists() {
            return Err(WalletError::NotFound(*address));
        }
        Wallet::load(&path)
    }
}
