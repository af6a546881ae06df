use crate::address::PeerAddress;
use crate::kv::NodeConfig;
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Default listen address for the node and default target for the client
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:4000";

/// A node of the distributed key-value store
#[derive(Debug, Parser)]
#[command(name = "kv-node", version)]
pub struct ServerArgs {
    /// Peers to join at startup (IPV4:PORT or localhost:PORT)
    #[arg(value_name = "PEER")]
    pub peers: Vec<PeerAddress>,

    /// Address to listen on
    #[arg(short, long, env = "KV_NODE_IP", default_value = DEFAULT_ADDRESS)]
    pub ip: PeerAddress,

    /// Log every request and peer contact
    #[arg(short, long, env = "KV_VERBOSE")]
    pub verbose: bool,

    /// Give up on a peer call after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub rpc_timeout_ms: Option<u64>,
}

impl ServerArgs {
    pub fn into_config(self) -> NodeConfig {
        NodeConfig {
            listen: self.ip,
            peers: self.peers,
            rpc_timeout: self.rpc_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set. Otherwise our own crates log at `debug` when
/// verbose and `info` when not, and everything else at `warn`.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,kv_node={level},kv_client={level}")));

    // A second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
