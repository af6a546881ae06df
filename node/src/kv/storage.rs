use std::collections::HashMap;
use tokio::sync::RwLock;

/// Full copy of a node's key-value pairs
pub type Snapshot = HashMap<String, String>;

/// A write that arrived from a client; the receiving node forwards it to
/// every registered peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWrite {
    pub key: String,
    pub value: String,
}

impl ClientWrite {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The form this write takes when forwarded to a peer
    pub fn to_replicated(&self) -> ReplicatedWrite {
        ReplicatedWrite {
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

/// A write forwarded by a peer. Applied locally and never forwarded again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicatedWrite {
    pub key: String,
    pub value: String,
}

/// Request to `set`, tagged with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Client(ClientWrite),
    Replicated(ReplicatedWrite),
}

impl Write {
    pub fn key(&self) -> &str {
        match self {
            Write::Client(w) => &w.key,
            Write::Replicated(w) => &w.key,
        }
    }
}

impl From<ClientWrite> for Write {
    fn from(write: ClientWrite) -> Self {
        Write::Client(write)
    }
}

impl From<ReplicatedWrite> for Write {
    fn from(write: ReplicatedWrite) -> Self {
        Write::Replicated(write)
    }
}

/// In-memory key-value store owned by a single node.
///
/// Each method takes the lock once and releases it before returning, so a
/// single call is atomic with respect to every other call on the same node.
#[derive(Default)]
pub struct Store {
    data: RwLock<HashMap<String, String>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.data.read().await.get(key).cloned()
    }

    /// Inserts or overwrites `key`
    pub async fn put(&self, key: String, value: String) {
        self.data.write().await.insert(key, value);
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.data.read().await.clone()
    }

    /// Copies every pair from `snapshot` into the store, overwriting local
    /// values for shared keys and leaving other local keys alone.
    /// Returns the number of keys written.
    pub async fn merge(&self, snapshot: Snapshot) -> usize {
        let count = snapshot.len();
        self.data.write().await.extend(snapshot);
        count
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}
