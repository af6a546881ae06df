pub mod client;
pub mod conversions;
pub mod grpc_server;
pub mod network;
pub mod peer_registry;
pub mod replication;
pub mod storage;

use crate::address::PeerAddress;
use anyhow::{Context, Result};
use network::{GrpcPeerNetwork, PeerTransport};
use peer_registry::{PeerRegistry, Registration};
use replication::{JoinReport, Replicator};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storage::{Snapshot, Store, Write};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One key-value node: its identity, store, peers, and outbound transport.
///
/// Every RPC handler is a method here, so several nodes can run side by side
/// in one process.
pub struct KvNode {
    self_addr: PeerAddress,
    store: Store,
    peers: PeerRegistry,
    replicator: Replicator,
}

impl KvNode {
    pub fn new(self_addr: PeerAddress, transport: Arc<dyn PeerTransport>) -> Self {
        let peers = PeerRegistry::new(self_addr.clone());
        let replicator = Replicator::new(peers.clone(), transport);
        Self {
            self_addr,
            store: Store::new(),
            peers,
            replicator,
        }
    }

    pub fn self_addr(&self) -> &PeerAddress {
        &self.self_addr
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let value = self.store.get(key).await;
        match &value {
            Some(v) => debug!("received GET request for key '{}': value = '{}'", key, v),
            None => debug!("received GET request for key '{}': value = undefined", key),
        }
        value
    }

    /// Apply a write and return the stored value.
    ///
    /// Client writes are then forwarded to every peer; the forwards run in
    /// the background and their outcome does not affect the result.
    pub async fn set(&self, write: Write) -> String {
        match write {
            Write::Client(write) => {
                debug!(
                    "received SET request for key '{}': new value = '{}'",
                    write.key, write.value
                );
                self.store.put(write.key.clone(), write.value.clone()).await;
                self.replicator.fan_out(&write).await;
                write.value
            }
            Write::Replicated(write) => {
                debug!(
                    "received peer update for key '{}': new value = '{}'",
                    write.key, write.value
                );
                self.store.put(write.key, write.value.clone()).await;
                write.value
            }
        }
    }

    pub async fn list(&self) -> Snapshot {
        debug!("received LIST request");
        self.store.snapshot().await
    }

    /// Register `address` as a peer and return the full store.
    ///
    /// Invalid addresses and this node's own address are not registered;
    /// the store is returned either way.
    pub async fn register_peer(&self, address: &str) -> Snapshot {
        debug!("received new peer registration: {}", address);
        match PeerAddress::parse(address) {
            Ok(addr) => match self.peers.register(addr).await {
                Registration::Added => info!("registered new peer {}", address),
                Registration::AlreadyPresent => debug!("peer {} already registered", address),
                Registration::SelfAddress => {
                    debug!("ignoring registration of own address {}", address)
                }
            },
            Err(err) => warn!("ignoring peer registration: {}", err),
        }
        self.store.snapshot().await
    }

    /// Join handshake against the configured peers
    pub async fn join(&self, configured: &[PeerAddress]) -> JoinReport {
        let report = self.replicator.join(&self.store, configured).await;

        if !configured.is_empty() {
            debug!("store contents after initial synchronization:");
            let mut pairs: Vec<_> = self.store.snapshot().await.into_iter().collect();
            pairs.sort();
            for (key, value) in pairs {
                debug!("\t{} = {}", key, value);
            }
            debug!("end of store dump");
        }

        report
    }

    /// Registered peers, in address order
    pub async fn peers(&self) -> Vec<PeerAddress> {
        self.peers.members().await
    }
}

/// Startup settings for a node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address to listen on. Port 0 picks a free port, which then becomes
    /// the address the node introduces itself with.
    pub listen: PeerAddress,
    /// Static peers to join at startup
    pub peers: Vec<PeerAddress>,
    /// Bound on each call to a peer
    pub rpc_timeout: Option<Duration>,
}

/// A node whose gRPC server is running
pub struct RunningNode {
    node: Arc<KvNode>,
    join_report: JoinReport,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: JoinHandle<Result<(), tonic::transport::Error>>,
}

impl RunningNode {
    pub fn node(&self) -> &Arc<KvNode> {
        &self.node
    }

    pub fn addr(&self) -> &PeerAddress {
        self.node.self_addr()
    }

    pub fn join_report(&self) -> &JoinReport {
        &self.join_report
    }

    /// Serve until `signal` resolves or the server stops on its own
    pub async fn run_until<F>(mut self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let server_exit = tokio::select! {
            _ = signal => None,
            result = &mut self.server => Some(result),
        };

        match server_exit {
            None => {
                info!("shutting down {}", self.addr());
                self.shutdown().await
            }
            Some(result) => result
                .context("gRPC server task failed")?
                .context("gRPC server stopped"),
        }
    }

    /// Stop accepting requests and wait for the server to finish
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.server
            .await
            .context("gRPC server task failed")?
            .context("gRPC server stopped")
    }
}

/// Bind, start serving, then run the join handshake against the configured
/// peers.
///
/// The server is up before the handshake starts, so peers that contact this
/// node while it joins are answered.
pub async fn start_node(config: NodeConfig) -> Result<RunningNode> {
    let listener = TcpListener::bind(config.listen.as_str())
        .await
        .with_context(|| format!("failed to listen on {}", config.listen))?;

    let local = listener
        .local_addr()
        .context("failed to read listener address")?;
    let self_addr = if config.listen.port() == 0 {
        config.listen.with_port(local.port())
    } else {
        config.listen.clone()
    };

    let transport = Arc::new(GrpcPeerNetwork::new(config.rpc_timeout));
    let node = Arc::new(KvNode::new(self_addr, transport));

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(grpc_server::serve(listener, Arc::clone(&node), async {
        let _ = shutdown_rx.await;
    }));
    info!("listening on {}...", node.self_addr());

    let join_report = node.join(&config.peers).await;

    Ok(RunningNode {
        node,
        join_report,
        shutdown_tx: Some(shutdown_tx),
        server,
    })
}
