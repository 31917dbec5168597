//! Remote signing peers
//!
//! A peer is a remote signing endpoint reached over some session transport.
//! The quorum signer only needs a [`PeerTransport`] per peer and the address
//! that peer claimed during its session handshake.

use crate::core::PartialSignatureSet;
use crate::crypto::Address;
use crate::signer::{SignRequest, Signer};
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Peer transport errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Transport failed: {0}")]
    Transport(String),
    #[error("Peer rejected the request: {0}")]
    Rejected(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Peer disconnected")]
    Disconnected,
}

/// Request/response capability of one remote signer
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Ask the peer to sign a batch; entries it skips come back as `None`
    async fn request_sign(&self, request: SignRequest) -> Result<PartialSignatureSet, PeerError>;

    /// Short description for logs
    fn describe(&self) -> String {
        "remote peer".to_string()
    }
}

/// A remote signer bound to the participant address it claimed
#[derive(Clone)]
pub struct PeerHandle {
    pub address: Address,
    pub transport: Arc<dyn PeerTransport>,
}

impl PeerHandle {
    pub fn new(address: Address, transport: Arc<dyn PeerTransport>) -> Self {
        Self { address, transport }
    }

    pub async fn request_sign(
        &self,
        request: SignRequest,
    ) -> Result<PartialSignatureSet, PeerError> {
        self.transport.request_sign(request).await
    }
}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("address", &self.address)
            .field("transport", &self.transport.describe())
            .finish()
    }
}

/// Supplies the current peer set; each call returns a fresh snapshot
pub trait PeerProvider: Send + Sync {
    fn peers(&self) -> Vec<PeerHandle>;
}

/// A fixed peer set
#[derive(Debug, Clone, Default)]
pub struct StaticPeers(Vec<PeerHandle>);

impl StaticPeers {
    pub fn new(peers: Vec<PeerHandle>) -> Self {
        Self(peers)
    }
}

impl PeerProvider for StaticPeers {
    fn peers(&self) -> Vec<PeerHandle> {
        self.0.clone()
    }
}

/// Peers bound as their sessions resolve
///
/// Each session offers the accounts its wallet holds; the first one still
/// needed is bound to that session. A session offering none is not bound.
/// With no expected addresses, any address not bound yet is accepted.
#[derive(Default)]
pub struct PeerRegistry {
    expected: Vec<Address>,
    bound: RwLock<Vec<PeerHandle>>,
}

impl PeerRegistry {
    pub fn new(expected: Vec<Address>) -> Self {
        Self {
            expected,
            bound: RwLock::new(Vec::new()),
        }
    }

    /// Bind a resolved session; returns the address it was bound to
    pub fn offer(
        &self,
        transport: Arc<dyn PeerTransport>,
        accounts: &[Address],
    ) -> Option<Address> {
        let mut bound = self.bound.write().unwrap_or_else(|e| e.into_inner());

        let address = accounts.iter().copied().find(|account| {
            (self.expected.is_empty() || self.expected.contains(account))
                && !bound.iter().any(|peer| peer.address == *account)
        });

        match address {
            Some(address) => {
                log::info!(
                    "Bound {} to {} ({} bound)",
                    transport.describe(),
                    address,
                    bound.len() + 1
                );
                bound.push(PeerHandle::new(address, transport));
                Some(address)
            }
            None => {
                log::warn!(
                    "Session {} offered no needed address: {:?}",
                    transport.describe(),
                    accounts
                );
                None
            }
        }
    }

    /// Number of bound peers
    pub fn bound_count(&self) -> usize {
        self.bound.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether enough peers are bound to reach `threshold`
    pub fn is_ready(&self, threshold: usize) -> bool {
        self.bound_count() >= threshold
    }

    /// Expected addresses that have no peer yet
    pub fn remaining(&self) -> Vec<Address> {
        let bound = self.bound.read().unwrap_or_else(|e| e.into_inner());
        self.expected
            .iter()
            .filter(|address| !bound.iter().any(|peer| peer.address == **address))
            .copied()
            .collect()
    }
}

impl PeerProvider for PeerRegistry {
    fn peers(&self) -> Vec<PeerHandle> {
        self.bound.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// A peer served by an in-process signer
pub struct LocalPeer {
    signer: Arc<dyn Signer>,
}

impl LocalPeer {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl PeerTransport for LocalPeer {
    async fn request_sign(&self, request: SignRequest) -> Result<PartialSignatureSet, PeerError> {
        let response = self
            .signer
            .sign(request)
            .await
            .map_err(|e| PeerError::Rejected(e.to_string()))?;

        response
            .to_partials()
            .map_err(|e| PeerError::InvalidResponse(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("local signer {}", self.signer.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::crypto::KeyPair;
    use crate::signer::LocalSigner;

    struct Unreachable;

    #[async_trait]
    impl PeerTransport for Unreachable {
        async fn request_sign(&self, _: SignRequest) -> Result<PartialSignatureSet, PeerError> {
            Err(PeerError::Disconnected)
        }
    }

    #[test]
    fn test_registry_binds_needed_addresses_once() {
        let a = KeyPair::generate().address();
        let b = KeyPair::generate().address();
        let outsider = KeyPair::generate().address();
        let registry = PeerRegistry::new(vec![a, b]);

        assert_eq!(registry.offer(Arc::new(Unreachable), &[outsider]), None);
        assert_eq!(registry.offer(Arc::new(Unreachable), &[outsider, a]), Some(a));
        assert_eq!(registry.offer(Arc::new(Unreachable), &[a]), None);
        assert!(!registry.is_ready(2));
        assert_eq!(registry.remaining(), vec![b]);

        assert_eq!(registry.offer(Arc::new(Unreachable), &[a, b]), Some(b));
        assert!(registry.is_ready(2));
        assert!(registry.remaining().is_empty());

        let peers = registry.peers();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].address, a);
        assert_eq!(peers[1].address, b);
    }

    #[test]
    fn test_open_registry_accepts_any_address() {
        let registry = PeerRegistry::new(Vec::new());
        let a = KeyPair::generate().address();

        assert_eq!(registry.offer(Arc::new(Unreachable), &[a]), Some(a));
        assert_eq!(registry.offer(Arc::new(Unreachable), &[a]), None);
        assert_eq!(registry.bound_count(), 1);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let a = KeyPair::generate().address();
        let b = KeyPair::generate().address();
        let registry = PeerRegistry::new(vec![a, b]);

        registry.offer(Arc::new(Unreachable), &[a]);
        let snapshot = registry.peers();
        registry.offer(Arc::new(Unreachable), &[b]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.peers().len(), 2);
    }

    #[tokio::test]
    async fn test_local_peer_signs() {
        let kp = KeyPair::generate();
        let peer = PeerHandle::new(
            kp.address(),
            Arc::new(LocalPeer::new(Arc::new(LocalSigner::new(kp.clone())))),
        );
        let txn = Transaction::payment(kp.address(), kp.address(), 1, 1);

        let partials = peer
            .request_sign(SignRequest::from_transactions(&[txn]).unwrap())
            .await
            .unwrap();
        assert_eq!(partials.len(), 1);
        assert!(partials[0].is_some());
        assert!(format!("{:?}", peer).contains("local signer"));
    }

    #[tokio::test]
    async fn test_local_peer_reports_rejection() {
        let kp = KeyPair::generate();
        let peer = LocalPeer::new(Arc::new(LocalSigner::new(kp)));

        let bad = SignRequest {
            txns: vec![crate::signer::SignRequestItem {
                txn: "@@@".to_string(),
                auth_addr: None,
            }],
        };
        assert!(matches!(
            peer.request_sign(bad).await,
            Err(PeerError::Rejected(_))
        ));
    }
}
