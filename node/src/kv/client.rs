use crate::address::PeerAddress;
use crate::kv::conversions::proto::kv_store_client::KvStoreClient;
use crate::kv::conversions::proto::{GetRequest, ListRequest, RegisterRequest, SetRequest};
use crate::kv::storage::{Snapshot, Write};
use std::time::Duration;
use thiserror::Error;
use tonic::transport::{Channel, Endpoint};

/// Failure of a single outbound call. Never fatal to the caller's process.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: PeerAddress,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("{op} request to {addr} failed: {status}")]
    Call {
        op: &'static str,
        addr: PeerAddress,
        #[source]
        status: tonic::Status,
    },
}

impl RpcError {
    pub fn addr(&self) -> &PeerAddress {
        match self {
            RpcError::Connect { addr, .. } | RpcError::Call { addr, .. } => addr,
        }
    }
}

/// gRPC caller for one target node.
///
/// Used by the command-line client and, through
/// [`GrpcPeerNetwork`](crate::kv::network::GrpcPeerNetwork), by nodes
/// talking to their peers.
#[derive(Clone)]
pub struct RpcClient {
    addr: PeerAddress,
    inner: KvStoreClient<Channel>,
}

impl RpcClient {
    /// Open a channel to `addr`.
    ///
    /// `timeout` bounds the connection attempt and every later call; `None`
    /// waits for the transport to give up on its own.
    pub async fn connect(addr: &PeerAddress, timeout: Option<Duration>) -> Result<Self, RpcError> {
        let connect_err = |source| RpcError::Connect {
            addr: addr.clone(),
            source,
        };

        let mut endpoint = Endpoint::from_shared(addr.endpoint()).map_err(connect_err)?;
        if let Some(timeout) = timeout {
            endpoint = endpoint.connect_timeout(timeout).timeout(timeout);
        }
        let channel = endpoint.connect().await.map_err(connect_err)?;

        Ok(Self {
            addr: addr.clone(),
            inner: KvStoreClient::new(channel),
        })
    }

    /// Returns `None` when the key is not defined on the target
    pub async fn get(&self, key: &str) -> Result<Option<String>, RpcError> {
        let mut client = self.inner.clone();
        let reply = client
            .get(GetRequest {
                key: key.to_string(),
            })
            .await
            .map_err(|status| self.call_error("get", status))?;
        Ok(reply.into_inner().into())
    }

    /// Returns the value the target stored
    pub async fn set(&self, write: Write) -> Result<String, RpcError> {
        let mut client = self.inner.clone();
        let reply = client
            .set(SetRequest::from(write))
            .await
            .map_err(|status| self.call_error("set", status))?;
        Ok(reply.into_inner().value)
    }

    pub async fn list(&self) -> Result<Snapshot, RpcError> {
        let mut client = self.inner.clone();
        let reply = client
            .list(ListRequest {})
            .await
            .map_err(|status| self.call_error("list", status))?;
        Ok(reply.into_inner().into())
    }

    /// Introduce `self_addr` to the target; the reply is the target's store
    pub async fn register_with_peer(&self, self_addr: &PeerAddress) -> Result<Snapshot, RpcError> {
        let mut client = self.inner.clone();
        let reply = client
            .register_with_peer(RegisterRequest {
                address: self_addr.to_string(),
            })
            .await
            .map_err(|status| self.call_error("registerWithPeer", status))?;
        Ok(reply.into_inner().into())
    }

    fn call_error(&self, op: &'static str, status: tonic::Status) -> RpcError {
        RpcError::Call {
            op,
            addr: self.addr.clone(),
            status,
        }
    }
}
