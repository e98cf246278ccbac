use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use replikv_core::{NodeId, Peer, Router, StorageEngine};

use crate::config::NodeConfig;
use crate::server;
use crate::transport::TcpTransport;

/// A running node: its router and the server task in front of it.
pub struct ClusterNode {
    router: Arc<Router<TcpTransport>>,
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl ClusterNode {
    /// Binds `config.listen_addr` and starts serving.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        config.validate().context("invalid node configuration")?;
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.listen_addr))?;
        Self::serve(listener, config)
    }

    /// Starts serving on an already bound listener. `config.listen_addr` is
    /// not consulted; peers must be configured with the listener's address.
    pub fn serve(listener: TcpListener, config: NodeConfig) -> Result<Self> {
        config.validate().context("invalid node configuration")?;
        let local_addr = listener.local_addr().context("listener has no local address")?;

        let router = Arc::new(Router::new(
            config.membership(),
            StorageEngine::new(),
            Arc::new(TcpTransport),
            config.replication_config(),
        ));
        info!(
            node = config.node_id,
            addr = %local_addr,
            role = %router.role(),
            leader = config.leader.id,
            peers = config.peers.len(),
            "node started"
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(server::run_until(listener, Arc::clone(&router), async move {
            let _ = shutdown_rx.await;
        }));

        Ok(Self {
            router,
            local_addr,
            shutdown_tx,
            server,
        })
    }

    pub fn id(&self) -> NodeId {
        self.router.id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn router(&self) -> &Arc<Router<TcpTransport>> {
        &self.router
    }

    pub fn set_leader(&self, leader: Peer) {
        self.router.set_leader(leader);
    }

    pub fn add_follower(&self, id: NodeId, addr: impl Into<String>) {
        self.router.add_follower(id, addr);
    }

    /// Get node state for diagnostics
    pub fn status(&self) -> String {
        let view = self.router.view();
        format!(
            "node={} role={} leader={} peers={} keys={}",
            self.id(),
            view.role,
            view.leader_id(self.id()),
            view.peers.len(),
            self.router.storage().size()
        )
    }

    /// Stops accepting connections and waits for the accept loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.server.await;
        info!(node = self.router.id(), "node stopped");
    }
}
