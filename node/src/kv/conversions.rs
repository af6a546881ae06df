use crate::kv::storage::{ClientWrite, ReplicatedWrite, Snapshot, Write};

/// Wire messages for the `kv.KvStore` service plus the generated client
/// and server modules (`kv_store_client`, `kv_store_server`).
pub mod proto {
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetRequest {
        #[prost(string, tag = "1")]
        pub key: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetReply {
        #[prost(string, tag = "1")]
        pub value: String,
        #[prost(bool, tag = "2")]
        pub defined: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SetRequest {
        #[prost(string, tag = "1")]
        pub key: String,
        #[prost(string, tag = "2")]
        pub value: String,
        /// true for client writes, false for writes forwarded by a peer
        #[prost(bool, tag = "3")]
        pub broadcast: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SetReply {
        #[prost(string, tag = "1")]
        pub value: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ListRequest {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RegisterRequest {
        #[prost(string, tag = "1")]
        pub address: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StoreReply {
        #[prost(map = "string, string", tag = "1")]
        pub store: HashMap<String, String>,
    }

    include!(concat!(env!("OUT_DIR"), "/kv.KvStore.rs"));
}

use proto::{GetReply, SetRequest, StoreReply};

/// Convert wire SetRequest to a typed write.
/// Maps: broadcast=true -> Client, broadcast=false -> Replicated
impl From<SetRequest> for Write {
    fn from(req: SetRequest) -> Self {
        if req.broadcast {
            Write::Client(ClientWrite {
                key: req.key,
                value: req.value,
            })
        } else {
            Write::Replicated(ReplicatedWrite {
                key: req.key,
                value: req.value,
            })
        }
    }
}

/// Convert a typed write to the wire SetRequest
impl From<Write> for SetRequest {
    fn from(write: Write) -> Self {
        match write {
            Write::Client(w) => SetRequest {
                key: w.key,
                value: w.value,
                broadcast: true,
            },
            Write::Replicated(w) => SetRequest {
                key: w.key,
                value: w.value,
                broadcast: false,
            },
        }
    }
}

/// Absent keys travel as `defined = false` with an empty value
impl From<Option<String>> for GetReply {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(value) => GetReply {
                value,
                defined: true,
            },
            None => GetReply {
                value: String::new(),
                defined: false,
            },
        }
    }
}

impl From<GetReply> for Option<String> {
    fn from(reply: GetReply) -> Self {
        reply.defined.then_some(reply.value)
    }
}

impl From<Snapshot> for StoreReply {
    fn from(store: Snapshot) -> Self {
        StoreReply { store }
    }
}

impl From<StoreReply> for Snapshot {
    fn from(reply: StoreReply) -> Self {
        reply.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_broadcast_flag_selects_write_kind() {
        let client: Write = SetRequest {
            key: "x".to_string(),
            value: "1".to_string(),
            broadcast: true,
        }
        .into();
        assert_eq!(client, Write::Client(ClientWrite::new("x", "1")));

        let forwarded: Write = SetRequest {
            key: "x".to_string(),
            value: "1".to_string(),
            broadcast: false,
        }
        .into();
        assert!(matches!(forwarded, Write::Replicated(_)));
    }

    #[test]
    fn test_replicated_write_clears_broadcast() {
        let req: SetRequest = Write::from(ClientWrite::new("k", "v").to_replicated()).into();
        assert!(!req.broadcast);
        assert_eq!(req.key, "k");
        assert_eq!(req.value, "v");
    }

    #[test]
    fn test_missing_key_reply() {
        let reply: GetReply = None.into();
        assert!(!reply.defined);
        assert_eq!(reply.value, "");

        let value: Option<String> = reply.into();
        assert_eq!(value, None);
    }

    #[test]
    fn test_defined_empty_value_is_still_defined() {
        let reply: GetReply = Some(String::new()).into();
        let value: Option<String> = reply.into();
        assert_eq!(value, Some(String::new()));
    }

    #[test]
    fn test_store_reply_wire_format() {
        let mut store = Snapshot::new();
        store.insert("a".to_string(), "1".to_string());
        store.insert("b".to_string(), "2".to_string());

        let bytes = StoreReply::from(store.clone()).encode_to_vec();
        let decoded = StoreReply::decode(bytes.as_slice()).unwrap();

        assert_eq!(Snapshot::from(decoded), store);
    }
}
