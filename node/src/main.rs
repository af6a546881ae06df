use anyhow::Result;
use clap::Parser;
use kv_node::config::{init_tracing, ServerArgs};
use kv_node::start_node;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_tracing(args.verbose);

    let config = args.into_config();
    info!(
        "starting node on {} with {} static peer(s)",
        config.listen,
        config.peers.len()
    );

    let node = start_node(config).await?;

    let report = node.join_report();
    if !report.failed.is_empty() {
        warn!(
            "{} peer(s) unreachable at startup; they stay registered for future writes",
            report.failed.len()
        );
    }

    node.run_until(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    })
    .await
}
