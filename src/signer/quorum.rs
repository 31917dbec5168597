//! Quorum signing across remote peers
//!
//! A [`QuorumSigner`] fans a request out to every peer the provider knows,
//! waits for the first `M` successful batches, then converts and merges them
//! into one multisig envelope per transaction.

use crate::core::{PartialSignatureSet, SignedTransaction};
use crate::crypto::Address;
use crate::multisig::{convert_encoded, merge_batches, to_multisig_slot, MultisigAccount, MultisigError};
use crate::signer::{PeerHandle, PeerProvider, SignRequest, SignResponse, Signer, SignerError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

// ===== Configuration =====

/// Quorum signer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumConfig {
    /// Fill a blank authorizing address on returned multisig envelopes
    /// whose sender is not the account itself. Some wallets omit it.
    pub auth_addr_shim: bool,
    /// Log each round at info level instead of debug
    pub debug: bool,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            auth_addr_shim: true,
            debug: false,
        }
    }
}

/// Set the authorizing address of a multisig envelope that lacks one
///
/// Applies only when the envelope carries a multisig signature and the
/// sender is not `account_address`. Returns whether anything changed.
pub fn fill_missing_auth_addr(stx: &mut SignedTransaction, account_address: Address) -> bool {
    if stx.has_multisig() && stx.auth_addr.is_none() && stx.txn.sender != account_address {
        stx.auth_addr = Some(account_address);
        return true;
    }
    false
}

// ===== Quorum Signer =====

type Contribution = (Address, PartialSignatureSet);

/// Signs by collecting a quorum of remote signatures
#[derive(Clone)]
pub struct QuorumSigner {
    address: Address,
    account: Option<MultisigAccount>,
    peers: Arc<dyn PeerProvider>,
    config: QuorumConfig,
}

impl QuorumSigner {
    /// A signer that forwards to the first peer to respond
    pub fn new(address: Address, peers: Arc<dyn PeerProvider>) -> Self {
        Self {
            address,
            account: None,
            peers,
            config: QuorumConfig::default(),
        }
    }

    /// Collect `threshold` participant signatures for `account`
    pub fn with_multisig(mut self, account: MultisigAccount) -> Self {
        self.address = account.address();
        self.account = Some(account);
        self
    }

    pub fn with_config(mut self, config: QuorumConfig) -> Self {
        self.config = config;
        self
    }

    pub fn account(&self) -> Option<&MultisigAccount> {
        self.account.as_ref()
    }

    /// Number of successful peers needed
    pub fn quorum(&self) -> usize {
        self.account
            .as_ref()
            .map(|account| account.threshold() as usize)
            .unwrap_or(1)
    }

    fn log_level(&self) -> log::Level {
        if self.config.debug {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }

    /// Fan the request out and wait for a quorum of successes
    ///
    /// The first failure cancels every pending worker and fails the call.
    async fn collect(&self, request: &SignRequest) -> Result<Vec<Contribution>, SignerError> {
        let peers = distinct_peers(self.peers.peers());
        let needed = self.quorum();

        if peers.len() < needed {
            return Err(SignerError::QuorumUnreachable { got: 0, needed });
        }

        log::log!(
            self.log_level(),
            "Requesting {} signatures from {} peers for {}",
            needed,
            peers.len(),
            self.address
        );

        let (result_tx, mut result_rx) = mpsc::channel(peers.len());
        let (cancel_tx, cancel_rx) = watch::channel(None::<String>);

        for peer in peers {
            spawn_worker(peer, request.clone(), result_tx.clone(), cancel_rx.clone());
        }
        drop(result_tx);

        let mut contributions = Vec::with_capacity(needed);

        while contributions.len() < needed {
            match result_rx.recv().await {
                Some(Ok((address, _))) if contributions.iter().any(|(a, _)| *a == address) => {
                    log::warn!("Ignoring second response from {}", address);
                }
                Some(Ok((address, partials))) => {
                    log::log!(
                        self.log_level(),
                        "Peer {} signed ({} of {})",
                        address,
                        contributions.len() + 1,
                        needed
                    );
                    contributions.push((address, partials));
                }
                Some(Err(e)) => {
                    log::warn!("Cancelling signing round: {}", e);
                    let _ = cancel_tx.send(Some(e.to_string()));
                    return Err(e);
                }
                None => {
                    return Err(SignerError::QuorumUnreachable {
                        got: contributions.len(),
                        needed,
                    })
                }
            }
        }

        let _ = cancel_tx.send(Some("quorum reached".to_string()));
        Ok(contributions)
    }

    /// Turn the collected batches into one envelope per transaction
    fn compose(&self, contributions: &[Contribution]) -> Result<PartialSignatureSet, SignerError> {
        let expected = contributions
            .iter()
            .map(|(_, partials)| partials.len())
            .max()
            .unwrap_or(0);

        for (address, partials) in contributions {
            if partials.len() != expected {
                return Err(SignerError::PartialCountMismatch {
                    address: *address,
                    got: partials.len(),
                    expected,
                });
            }
        }

        let Some(account) = &self.account else {
            return Ok(contributions
                .first()
                .map(|(_, partials)| partials.clone())
                .unwrap_or_default());
        };

        let converted = contributions
            .iter()
            .map(|(address, partials)| -> Result<PartialSignatureSet, SignerError> {
                partials
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| -> Result<Option<Vec<u8>>, SignerError> {
                        let Some(bytes) = entry else {
                            return Ok(None);
                        };
                        self.convert_entry(bytes, account)
                            .map(Some)
                            .map_err(|source| SignerError::Convert {
                                address: *address,
                                index,
                                source,
                            })
                    })
                    .collect()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let merged = merge_batches(&converted)?;

        for (index, entry) in merged.iter().enumerate() {
            let Some(bytes) = entry else {
                continue;
            };
            let signed = SignedTransaction::decode(bytes)?
                .multisig()
                .map(|msig| msig.signed_count())
                .unwrap_or(0);
            if signed < account.threshold() as usize {
                log::warn!(
                    "Transaction {} has {} of {} required signatures",
                    index,
                    signed,
                    account.threshold()
                );
            }
        }

        Ok(merged)
    }

    fn convert_entry(
        &self,
        bytes: &[u8],
        account: &MultisigAccount,
    ) -> Result<Vec<u8>, MultisigError> {
        if self.config.auth_addr_shim {
            let mut stx = SignedTransaction::decode(bytes)?;
            if fill_missing_auth_addr(&mut stx, account.address()) {
                log::debug!("Filled missing authorizing address of {}", stx.id()?);
                return Ok(to_multisig_slot(&stx, account)?.encode()?);
            }
        }

        convert_encoded(bytes, account)
    }
}

/// Keep the first handle bound to each address
fn distinct_peers(peers: Vec<PeerHandle>) -> Vec<PeerHandle> {
    let mut distinct: Vec<PeerHandle> = Vec::with_capacity(peers.len());
    for peer in peers {
        if distinct.iter().any(|p| p.address == peer.address) {
            log::warn!("Dropping duplicate peer for {}", peer.address);
            continue;
        }
        distinct.push(peer);
    }
    distinct
}

/// Run one peer's round trip, giving up as soon as the round is cancelled
fn spawn_worker(
    peer: PeerHandle,
    request: SignRequest,
    results: mpsc::Sender<Result<Contribution, SignerError>>,
    mut cancel: watch::Receiver<Option<String>>,
) {
    tokio::spawn(async move {
        let request = request.stamped(&peer.address);

        let outcome = tokio::select! {
            _ = cancel.changed() => {
                log::debug!("Peer {} cancelled", peer.address);
                return;
            }
            outcome = peer.request_sign(request) => outcome,
        };

        let outcome = outcome
            .map(|partials| (peer.address, partials))
            .map_err(|source| SignerError::Peer {
                address: peer.address,
                source,
            });

        tokio::select! {
            _ = cancel.changed() => {}
            _ = results.send(outcome) => {}
        }
    });
}

#[async_trait]
impl Signer for QuorumSigner {
    async fn sign(&self, request: SignRequest) -> Result<SignResponse, SignerError> {
        let contributions = self.collect(&request).await?;
        let composed = self.compose(&contributions)?;

        log::log!(
            self.log_level(),
            "Composed {} of {} transactions for {}",
            composed.iter().filter(|entry| entry.is_some()).count(),
            composed.len(),
            self.address
        );

        Ok(SignResponse::from_partials(&composed))
    }

    fn address(&self) -> Address {
        self.address
    }
}
