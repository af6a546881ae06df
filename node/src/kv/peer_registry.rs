use crate::address::PeerAddress;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of [`PeerRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    AlreadyPresent,
    /// The address is this node's own; never stored
    SelfAddress,
}

/// Set of peer addresses this node forwards client writes to.
/// Grows only; peers are never removed.
/// Thread-safe for concurrent access from RPC handlers and fan-out tasks
#[derive(Clone)]
pub struct PeerRegistry {
    self_addr: PeerAddress,
    peers: Arc<RwLock<BTreeSet<PeerAddress>>>,
}

impl PeerRegistry {
    /// Create an empty registry for the node listening on `self_addr`
    pub fn new(self_addr: PeerAddress) -> Self {
        Self {
            self_addr,
            peers: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    pub fn self_addr(&self) -> &PeerAddress {
        &self.self_addr
    }

    /// Add a peer unless it is already known or is this node
    pub async fn register(&self, addr: PeerAddress) -> Registration {
        if addr == self.self_addr {
            return Registration::SelfAddress;
        }
        if self.peers.write().await.insert(addr) {
            Registration::Added
        } else {
            Registration::AlreadyPresent
        }
    }

    pub async fn contains(&self, addr: &PeerAddress) -> bool {
        self.peers.read().await.contains(addr)
    }

    /// Current members, in address order
    pub async fn members(&self) -> Vec<PeerAddress> {
        self.peers.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}
