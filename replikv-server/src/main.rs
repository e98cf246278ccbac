use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use replikv_core::Peer;
use replikv_server::config::parse_peer;
use replikv_server::{ClusterNode, NodeConfig};

/// Run one node of a leader/follower replicated key-value store.
///
/// Settings come from the environment (`NODE_ID`, `LISTEN_ADDR`, `LEADER`,
/// `PEERS`, `REPLICATION_TIMEOUT_MS`, `MAX_IN_FLIGHT`); any flag given here
/// overrides its variable.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Numeric node id (non-zero)
    #[arg(long)]
    id: Option<u64>,

    /// Address to serve clients and peers on
    #[arg(long)]
    listen: Option<String>,

    /// Leader as id=addr; defaults to this node
    #[arg(long, value_name = "ID=ADDR")]
    leader: Option<String>,

    /// A peer as id=addr. Repeat the flag or separate entries with commas
    #[arg(long = "peer", value_name = "ID=ADDR", value_delimiter = ',')]
    peers: Vec<String>,

    /// Bound on each replication or forward call
    #[arg(long)]
    replication_timeout_ms: Option<u64>,

    /// Outbound replication calls allowed in flight at once
    #[arg(long)]
    max_in_flight: Option<usize>,
}

impl Args {
    fn into_config(self) -> Result<NodeConfig> {
        let mut config = NodeConfig::from_env()?;
        let self_led = config.is_leader();

        if let Some(id) = self.id {
            config.node_id = id;
        }
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        match self.leader {
            Some(leader) => config.leader = parse_peer(&leader)?,
            // keep leading ourselves under the overridden identity
            None if self_led => {
                config.leader = Peer::new(config.node_id, config.listen_addr.clone());
            }
            None => {}
        }
        if !self.peers.is_empty() {
            config.peers = self
                .peers
                .iter()
                .map(|entry| parse_peer(entry).map(|p| (p.id, p.addr)))
                .collect::<Result<_, _>>()?;
        }
        if let Some(ms) = self.replication_timeout_ms {
            config.replication_timeout_ms = ms;
        }
        if let Some(max) = self.max_in_flight {
            config.max_in_flight = max;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Args::parse().into_config().context("invalid arguments")?;
    let node = ClusterNode::start(config).await?;
    info!("{}", node.status());
    info!(
        "try: printf 'SET hello world\\nGET hello\\n' | nc {}",
        node.local_addr()
    );

    wait_for_signal().await;
    info!("received shutdown signal");
    node.shutdown().await;
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(err) = result {
                            warn!(error = ?err, "failed to listen for ctrl-c");
                        }
                    }
                    _ = term.recv() => {}
                }
                return;
            }
            Err(err) => warn!(error = ?err, "failed to install SIGTERM handler"),
        }
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to install ctrl-c handler");
    }
}
