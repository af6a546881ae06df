//! Cross-node flows: write fan-out and the join handshake.
//!
//! Fan-out runs when a node applies a [`ClientWrite`]: every registered peer
//! receives the write as a [`ReplicatedWrite`], which the peer applies
//! without forwarding. That type distinction is the only thing stopping
//! writes from circulating between peers forever.
//!
//! Each peer has its own outbox drained by a single task, so writes reach a
//! given peer in the order this node applied them.
//!
//! The join handshake runs once at startup. For each configured peer the
//! node registers the peer locally, introduces itself with
//! `registerWithPeer`, and merges the returned store into its own.

use crate::address::PeerAddress;
use crate::kv::network::PeerTransport;
use crate::kv::peer_registry::{PeerRegistry, Registration};
use crate::kv::storage::{ClientWrite, ReplicatedWrite, Store};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// What happened to each configured peer during [`Replicator::join`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JoinReport {
    /// Registered and merged their store into ours
    pub synced: Vec<PeerAddress>,
    /// Registered, but the introduction failed
    pub failed: Vec<PeerAddress>,
    /// Self, duplicates, or already registered
    pub skipped: Vec<PeerAddress>,
}

type Outbox = mpsc::UnboundedSender<ReplicatedWrite>;

#[derive(Clone)]
pub struct Replicator {
    peers: PeerRegistry,
    transport: Arc<dyn PeerTransport>,
    /// Created on a peer's first write
    outboxes: Arc<Mutex<HashMap<PeerAddress, Outbox>>>,
}

impl Replicator {
    pub fn new(peers: PeerRegistry, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            peers,
            transport,
            outboxes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queue `write` for every current peer without waiting for delivery.
    ///
    /// A failed delivery is logged and affects neither the other peers nor
    /// the local write. Returns the number of peers the write was queued for.
    pub async fn fan_out(&self, write: &ClientWrite) -> usize {
        let targets = self.peers.members().await;
        let mut outboxes = self.outboxes.lock().await;

        for peer in &targets {
            debug!("updating peer '{}': '{}' = '{}'", peer, write.key, write.value);

            let outbox = outboxes
                .entry(peer.clone())
                .or_insert_with(|| self.spawn_sender(peer.clone()));

            // The sender task only stops if it panicked; start a fresh one
            if let Err(mpsc::error::SendError(write)) = outbox.send(write.to_replicated()) {
                let fresh = self.spawn_sender(peer.clone());
                let _ = fresh.send(write);
                *outbox = fresh;
            }
        }

        targets.len()
    }

    /// Deliver queued writes to `peer` one at a time, in queue order
    fn spawn_sender(&self, peer: PeerAddress) -> Outbox {
        let (tx, mut rx) = mpsc::unbounded_channel::<ReplicatedWrite>();
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            while let Some(write) = rx.recv().await {
                if let Err(err) = transport.replicate(&peer, write).await {
                    warn!("could not update peer {}: {}", peer, err);
                }
            }
        });

        tx
    }

    /// Run the join handshake against the statically configured peers.
    ///
    /// Peers are registered before they are contacted and stay registered
    /// when the introduction fails.
    ///
    /// A write a peer forwards to us after taking its snapshot can be
    /// overwritten by the older value in that snapshot when it is merged.
    /// That window is accepted.
    pub async fn join(&self, store: &Store, configured: &[PeerAddress]) -> JoinReport {
        let mut report = JoinReport::default();
        let mut targets = Vec::new();

        for peer in configured {
            match self.peers.register(peer.clone()).await {
                Registration::Added => targets.push(peer.clone()),
                Registration::AlreadyPresent | Registration::SelfAddress => {
                    debug!("skipping peer {}", peer);
                    report.skipped.push(peer.clone());
                }
            }
        }

        let self_addr = self.peers.self_addr();
        let introductions = targets.iter().map(|peer| async move {
            debug!("registering with peer {}...", peer);
            (peer, self.transport.register_with(peer, self_addr).await)
        });

        for (peer, result) in join_all(introductions).await {
            match result {
                Ok(snapshot) => {
                    let merged = store.merge(snapshot).await;
                    info!("synchronized with peer {} ({} keys)", peer, merged);
                    report.synced.push(peer.clone());
                }
                Err(err) => {
                    warn!("cannot register with peer {}: {}", peer, err);
                    report.failed.push(peer.clone());
                }
            }
        }

        report
    }
}
