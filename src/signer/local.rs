//! In-process signer holding one private key

use crate::core::{sign_transaction, PartialSignatureSet};
use crate::crypto::{Address, KeyPair};
use crate::multisig::{sign_multisig_transaction, MultisigAccount};
use crate::signer::{SignRequest, SignResponse, Signer, SignerError};
use async_trait::async_trait;

/// Options for a [`LocalSigner`]
#[derive(Debug, Clone, Default)]
pub struct LocalSignerOptions {
    /// Sign as a participant of this account instead of with a plain signature
    pub multisig: Option<MultisigAccount>,
    /// Only sign transactions sent by this address; others are left blank
    pub match_sender: Option<Address>,
}

/// Signs every transaction of a batch directly with its own key
#[derive(Debug, Clone)]
pub struct LocalSigner {
    key_pair: KeyPair,
    options: LocalSignerOptions,
}

impl LocalSigner {
    pub fn new(key_pair: KeyPair) -> Self {
        Self::with_options(key_pair, LocalSignerOptions::default())
    }

    pub fn with_options(key_pair: KeyPair, options: LocalSignerOptions) -> Self {
        Self { key_pair, options }
    }

    pub fn with_multisig(mut self, account: MultisigAccount) -> Self {
        self.options.multisig = Some(account);
        self
    }

    pub fn with_match_sender(mut self, sender: Address) -> Self {
        self.options.match_sender = Some(sender);
        self
    }

    pub fn key_address(&self) -> Address {
        self.key_pair.address()
    }

    fn sign_batch(&self, request: &SignRequest) -> Result<PartialSignatureSet, SignerError> {
        let txns = request.transactions()?;
        let mut partials = Vec::with_capacity(txns.len());

        for txn in &txns {
            if let Some(sender) = &self.options.match_sender {
                if txn.sender != *sender {
                    log::debug!("Skipping transaction from {} (not {})", txn.sender, sender);
                    partials.push(None);
                    continue;
                }
            }

            let stx = match &self.options.multisig {
                Some(account) => sign_multisig_transaction(&self.key_pair, account, txn)?,
                None => sign_transaction(&self.key_pair, txn)?,
            };

            partials.push(Some(stx.encode()?));
        }

        Ok(partials)
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn sign(&self, request: SignRequest) -> Result<SignResponse, SignerError> {
        let partials = self.sign_batch(&request)?;
        log::debug!(
            "{} signed {} of {} transactions",
            self.key_pair.address(),
            partials.iter().filter(|p| p.is_some()).count(),
            partials.len()
        );
        Ok(SignResponse::from_partials(&partials))
    }

    /// The multisig account's address when signing as a participant
    fn address(&self) -> Address {
        match &self.options.multisig {
            Some(account) => account.address(),
            None => self.key_pair.address(),
        }
    }
}
