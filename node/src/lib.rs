// Library interface for the key-value node, shared by the node and client
// binaries

pub mod address;
pub mod config;
pub mod kv;

// Re-export commonly used types for convenience
pub use address::{is_valid_address, AddressError, PeerAddress};
pub use kv::client::{RpcClient, RpcError};
pub use kv::replication::JoinReport;
pub use kv::storage::{ClientWrite, ReplicatedWrite, Snapshot, Write};
pub use kv::{start_node, KvNode, NodeConfig, RunningNode};
