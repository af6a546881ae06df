use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use kv_node::config::{init_tracing, DEFAULT_ADDRESS};
use kv_node::{ClientWrite, PeerAddress, RpcClient, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Query and update a node of the distributed key-value store
#[derive(Debug, Parser)]
#[command(name = "kv-client", version)]
#[command(group(ArgGroup::new("op").required(true).multiple(true).args(["get", "set", "list"])))]
struct Args {
    /// Node to talk to
    #[arg(short, long, env = "KV_NODE_IP", default_value = DEFAULT_ADDRESS)]
    ip: PeerAddress,

    /// Print the value stored under KEY (repeatable)
    #[arg(short, long, value_name = "KEY", value_parser = parse_key)]
    get: Vec<String>,

    /// Store VALUE under KEY on the node and its peers (repeatable)
    #[arg(short, long, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// Print every key-value pair defined on the node
    #[arg(short, long)]
    list: bool,

    /// Print one JSON document per operation
    #[arg(long)]
    json: bool,

    /// Log each request sent
    #[arg(short, long, env = "KV_VERBOSE")]
    verbose: bool,

    /// Give up on the node after this many milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    timeout_ms: u64,
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn parse_key(s: &str) -> Result<String, String> {
    if is_token(s) {
        Ok(s.to_string())
    } else {
        Err(format!("invalid key '{s}': expected non-empty alphanumeric"))
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let Some((key, value)) = s.split_once('=') else {
        return Err(format!("invalid pair '{s}': expected KEY=VALUE"));
    };
    if !is_token(key) || !is_token(value) {
        return Err(format!(
            "invalid pair '{s}': key and value must be non-empty alphanumeric"
        ));
    }
    Ok((key.to_string(), value.to_string()))
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Output<'a> {
    Get {
        key: &'a str,
        value: Option<String>,
    },
    Set {
        key: &'a str,
        value: String,
    },
    List {
        node: &'a str,
        store: BTreeMap<String, String>,
    },
}

fn format_get(key: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("'{key}'='{value}'"),
        None => format!("'{key}': undefined"),
    }
}

fn format_list(node: &PeerAddress, store: &Snapshot) -> String {
    let sorted: BTreeMap<_, _> = store.iter().collect();

    let mut out = format!("Key-value pairs defined on {node}:\n");
    for (key, value) in sorted {
        out.push_str(&format!("  - '{key}'='{value}'\n"));
    }
    out.push_str("-- end of key-value dump --");
    out
}

fn print_json(output: &Output<'_>) -> Result<()> {
    println!("{}", serde_json::to_string(output)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let timeout = Duration::from_millis(args.timeout_ms);
    let client = RpcClient::connect(&args.ip, Some(timeout))
        .await
        .context("could not reach node")?;

    for key in &args.get {
        debug!("sending GET request to {} for key '{}'...", args.ip, key);
        let value = client.get(key).await.context("could not get key")?;
        if args.json {
            print_json(&Output::Get {
                key: key.as_str(),
                value,
            })?;
        } else {
            println!("{}", format_get(key, value.as_deref()));
        }
    }

    for (key, value) in &args.set {
        debug!("sending SET request to {} for key '{}'...", args.ip, key);
        let stored = client
            .set(ClientWrite::new(key.as_str(), value.as_str()).into())
            .await
            .context("could not set key-value pair")?;
        if args.json {
            print_json(&Output::Set {
                key: key.as_str(),
                value: stored,
            })?;
        }
    }

    if args.list {
        debug!("sending LIST request to {}...", args.ip);
        let store = client.list().await.context("could not get key-value pairs")?;
        if args.json {
            print_json(&Output::List {
                node: args.ip.as_str(),
                store: store.into_iter().collect(),
            })?;
        } else {
            println!("{}", format_list(&args.ip, &store));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("x=1"),
            Ok(("x".to_string(), "1".to_string()))
        );
        assert!(parse_key_value("x").is_err());
        assert!(parse_key_value("=1").is_err());
        assert!(parse_key_value("x=").is_err());
        assert!(parse_key_value("x=1=2").is_err());
        assert!(parse_key_value("my-key=1").is_err());
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("abc123"), Ok("abc123".to_string()));
        assert!(parse_key("").is_err());
        assert!(parse_key("a b").is_err());
    }

    #[test]
    fn test_requires_an_operation() {
        assert!(Args::try_parse_from(["kv-client"]).is_err());
        assert!(Args::try_parse_from(["kv-client", "--list"]).is_ok());
    }

    #[test]
    fn test_all_operations_together() {
        let args = Args::try_parse_from([
            "kv-client", "-i", "localhost:4001", "-g", "x", "-s", "x=2", "-l",
        ])
        .unwrap();

        assert_eq!(args.ip.as_str(), "localhost:4001");
        assert_eq!(args.get, vec!["x".to_string()]);
        assert_eq!(args.set, vec![("x".to_string(), "2".to_string())]);
        assert!(args.list);
        assert_eq!(args.timeout_ms, 1000);
    }

    #[test]
    fn test_get_and_set_repeat() {
        let args = Args::try_parse_from([
            "kv-client", "-g", "a", "--get", "b", "-s", "a=1", "--set", "b=2",
        ])
        .unwrap();

        assert_eq!(args.get, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            args.set,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ]
        );
        assert!(!args.list);
    }

    #[test]
    fn test_text_output() {
        assert_eq!(format_get("x", Some("1")), "'x'='1'");
        assert_eq!(format_get("y", None), "'y': undefined");

        let node = PeerAddress::parse("127.0.0.1:4000").unwrap();
        let store: Snapshot = [("b", "2"), ("a", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let expected = concat!(
            "Key-value pairs defined on 127.0.0.1:4000:\n",
            "  - 'a'='1'\n",
            "  - 'b'='2'\n",
            "-- end of key-value dump --",
        );
        assert_eq!(format_list(&node, &store), expected);
    }

    #[test]
    fn test_json_output() {
        let json = serde_json::to_string(&Output::Get {
            key: "x",
            value: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"op":"get","key":"x","value":null}"#);

        let json = serde_json::to_string(&Output::List {
            node: "127.0.0.1:4000",
            store: BTreeMap::from([("a".to_string(), "1".to_string())]),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"op":"list","node":"127.0.0.1:4000","store":{"a":"1"}}"#
        );
    }
}
