use crate::address::PeerAddress;
use crate::kv::client::{RpcClient, RpcError};
use crate::kv::storage::{ReplicatedWrite, Snapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Outbound calls a node makes to its peers.
///
/// Only replicated writes can be sent to a peer: a node never asks a peer to
/// forward a write further.
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    /// Deliver a forwarded write; returns the value the peer stored
    async fn replicate(
        &self,
        peer: &PeerAddress,
        write: ReplicatedWrite,
    ) -> Result<String, RpcError>;

    /// Introduce `self_addr` to `peer` and fetch its store
    async fn register_with(
        &self,
        peer: &PeerAddress,
        self_addr: &PeerAddress,
    ) -> Result<Snapshot, RpcError>;
}

/// gRPC implementation of [`PeerTransport`]
#[derive(Clone)]
pub struct GrpcPeerNetwork {
    /// Bound on connecting to and calling a peer
    timeout: Option<Duration>,
    /// Cached gRPC clients for reuse
    clients: Arc<RwLock<HashMap<PeerAddress, RpcClient>>>,
}

impl GrpcPeerNetwork {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get or create a gRPC client for the target peer
    async fn get_client(&self, target: &PeerAddress) -> Result<RpcClient, RpcError> {
        // Check if we have a cached client
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(target) {
                return Ok(client.clone());
            }
        }

        // A failed connect caches nothing, so the next call tries again
        let client = RpcClient::connect(target, self.timeout).await?;

        self.clients
            .write()
            .await
            .insert(target.clone(), client.clone());

        Ok(client)
    }
}

impl Default for GrpcPeerNetwork {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl PeerTransport for GrpcPeerNetwork {
    async fn replicate(
        &self,
        peer: &PeerAddress,
        write: ReplicatedWrite,
    ) -> Result<String, RpcError> {
        let client = self.get_client(peer).await?;
        client.set(write.into()).await
    }

    async fn register_with(
        &self,
        peer: &PeerAddress,
        self_addr: &PeerAddress,
    ) -> Result<Snapshot, RpcError> {
        let client = self.get_client(peer).await?;
        client.register_with_peer(self_addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn unused_addr() -> PeerAddress {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        PeerAddress::parse(format!("127.0.0.1:{port}")).unwrap()
    }

    #[tokio::test]
    async fn test_network_creation() {
        let network = GrpcPeerNetwork::default();

        assert_eq!(network.clients.read().await.len(), 0);
        assert_eq!(network.timeout, None);
    }

    #[tokio::test]
    async fn test_failed_connect_is_not_cached() {
        let network = GrpcPeerNetwork::new(Some(Duration::from_millis(500)));
        let peer = unused_addr().await;

        let result = network
            .replicate(
                &peer,
                ReplicatedWrite {
                    key: "k".to_string(),
                    value: "v".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(RpcError::Connect { .. })));
        assert!(network.clients.read().await.is_empty());
    }
}
