use crate::kv::conversions::proto::kv_store_server::{KvStore, KvStoreServer};
use crate::kv::conversions::proto::{
    GetReply, GetRequest, ListRequest, RegisterRequest, SetReply, SetRequest, StoreReply,
};
use crate::kv::storage::Write;
use crate::kv::KvNode;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

/// gRPC service implementation for the key-value operations
pub struct KvGrpcService {
    node: Arc<KvNode>,
}

impl KvGrpcService {
    /// Create a new gRPC service wrapping a node
    pub fn new(node: Arc<KvNode>) -> Self {
        Self { node }
    }
}

#[tonic::async_trait]
impl KvStore for KvGrpcService {
    /// Absent keys are a normal reply with `defined = false`
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetReply>, Status> {
        let key = request.into_inner().key;
        let value = self.node.get(&key).await;
        Ok(Response::new(value.into()))
    }

    /// Store the pair and echo the value. Fan-out, if any, is not awaited.
    async fn set(&self, request: Request<SetRequest>) -> Result<Response<SetReply>, Status> {
        let write = Write::from(request.into_inner());
        if write.key().is_empty() {
            return Err(Status::invalid_argument("key must not be empty"));
        }

        let value = self.node.set(write).await;
        Ok(Response::new(SetReply { value }))
    }

    async fn list(&self, _request: Request<ListRequest>) -> Result<Response<StoreReply>, Status> {
        let store = self.node.list().await;
        Ok(Response::new(store.into()))
    }

    /// Register the caller as a peer and hand back our store
    async fn register_with_peer(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<StoreReply>, Status> {
        let address = request.into_inner().address;
        let store = self.node.register_peer(&address).await;
        Ok(Response::new(store.into()))
    }
}

/// Serve `node` on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    node: Arc<KvNode>,
    shutdown: F,
) -> Result<(), tonic::transport::Error>
where
    F: Future<Output = ()> + Send,
{
    let service = KvStoreServer::new(KvGrpcService::new(node));

    tonic::transport::Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::PeerAddress;
    use crate::kv::network::GrpcPeerNetwork;

    fn service() -> KvGrpcService {
        let addr = PeerAddress::parse("127.0.0.1:4000").unwrap();
        let node = KvNode::new(addr, Arc::new(GrpcPeerNetwork::default()));
        KvGrpcService::new(Arc::new(node))
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let svc = service();

        let reply = svc
            .get(Request::new(GetRequest {
                key: "nope".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(!reply.defined);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let svc = service();

        let reply = svc
            .set(Request::new(SetRequest {
                key: "x".to_string(),
                value: "1".to_string(),
                broadcast: true,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.value, "1");

        let reply = svc
            .get(Request::new(GetRequest {
                key: "x".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(reply.defined);
        assert_eq!(reply.value, "1");
    }

    #[tokio::test]
    async fn test_set_rejects_empty_key() {
        let svc = service();

        let status = svc
            .set(Request::new(SetRequest {
                key: String::new(),
                value: "1".to_string(),
                broadcast: true,
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_register_returns_store_and_ignores_invalid_address() {
        let svc = service();
        svc.set(Request::new(SetRequest {
            key: "a".to_string(),
            value: "1".to_string(),
            broadcast: false,
        }))
        .await
        .unwrap();

        let reply = svc
            .register_with_peer(Request::new(RegisterRequest {
                address: "not-an-address".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(reply.store.get("a"), Some(&"1".to_string()));
        assert!(svc.node.peers().await.is_empty());
    }
}
