use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use replikv_core::replication::{DEFAULT_MAX_IN_FLIGHT, DEFAULT_REPLICATION_TIMEOUT};
use replikv_core::{ClusterView, Membership, NodeId, Peer, ReplicationConfig, Role};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid peer entry '{0}', expected id=addr")]
    InvalidPeer(String),

    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("node id 0 is reserved for client requests")]
    ReservedId,

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("node {0} lists itself as a peer")]
    SelfAsPeer(NodeId),
}

/// Static description of one node and the cluster it starts in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub listen_addr: String,
    /// The leader at startup. Equal to `node_id` when this node leads.
    pub leader: Peer,
    /// Known peers. For a leader these are the followers it replicates to.
    pub peers: Vec<(NodeId, String)>,
    pub replication_timeout_ms: u64,
    pub max_in_flight: usize,
}

impl NodeConfig {
    /// A node that leads itself with no followers.
    pub fn standalone(node_id: NodeId, listen_addr: impl Into<String>) -> Self {
        let listen_addr = listen_addr.into();
        Self {
            node_id,
            leader: Peer::new(node_id, listen_addr.clone()),
            listen_addr,
            peers: Vec::new(),
            replication_timeout_ms: DEFAULT_REPLICATION_TIMEOUT.as_millis() as u64,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Load from environment variables
    ///
    /// `NODE_ID`, `LISTEN_ADDR`, `LEADER` (`id=addr`, defaults to self),
    /// `PEERS` (`id=addr,id=addr`), `REPLICATION_TIMEOUT_MS`, `MAX_IN_FLIGHT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_id = env_parse("NODE_ID", 1u64)?;
        let listen_addr =
            std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:7001".to_string());

        let mut config = Self::standalone(node_id, listen_addr);
        if let Ok(leader) = std::env::var("LEADER") {
            config.leader = parse_peer(&leader)?;
        }
        config.peers = parse_peers(&std::env::var("PEERS").unwrap_or_default())?
            .into_iter()
            .map(|p| (p.id, p.addr))
            .collect();
        config.replication_timeout_ms =
            env_parse("REPLICATION_TIMEOUT_MS", config.replication_timeout_ms)?;
        config.max_in_flight = env_parse("MAX_IN_FLIGHT", config.max_in_flight)?;

        config.validate()?;
        Ok(config)
    }

    /// Create default 3-node cluster for testing: node 1 leads nodes 2 and 3.
    pub fn default_cluster() -> Self {
        let mut config = Self::standalone(1, "127.0.0.1:7001");
        config.peers = vec![
            (2, "127.0.0.1:7002".to_string()),
            (3, "127.0.0.1:7003".to_string()),
        ];
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id == 0 || self.leader.id == 0 || self.peers.iter().any(|(id, _)| *id == 0) {
            return Err(ConfigError::ReservedId);
        }
        if self.listen_addr.is_empty() {
            return Err(ConfigError::Empty("listen address"));
        }
        if self.leader.addr.is_empty() {
            return Err(ConfigError::Empty("leader address"));
        }
        if self.peers.iter().any(|(_, addr)| addr.is_empty()) {
            return Err(ConfigError::Empty("peer address"));
        }
        if self.peers.iter().any(|(id, _)| *id == self.node_id) {
            return Err(ConfigError::SelfAsPeer(self.node_id));
        }
        Ok(())
    }

    pub fn is_leader(&self) -> bool {
        self.leader.id == self.node_id
    }

    pub fn peer_ids(&self) -> Vec<NodeId> {
        self.peers.iter().map(|(id, _)| *id).collect()
    }

    pub fn replication_config(&self) -> ReplicationConfig {
        ReplicationConfig {
            timeout: Duration::from_millis(self.replication_timeout_ms),
            max_in_flight: self.max_in_flight,
        }
    }

    /// Initial membership. A follower always knows its leader's address,
    /// whether or not the leader appears in `peers`.
    pub fn membership(&self) -> Membership {
        let mut peers: BTreeMap<NodeId, String> = self.peers.iter().cloned().collect();
        let role = if self.is_leader() {
            Role::Leader
        } else {
            peers.insert(self.leader.id, self.leader.addr.clone());
            Role::Follower {
                leader: self.leader.clone(),
            }
        };
        Membership::new(self.node_id, ClusterView::new(role, peers))
    }
}

/// Parses `id=addr`.
pub fn parse_peer(entry: &str) -> Result<Peer, ConfigError> {
    let Some((id, addr)) = entry.trim().split_once('=') else {
        return Err(ConfigError::InvalidPeer(entry.to_string()));
    };
    let id: NodeId = id
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPeer(entry.to_string()))?;
    let addr = addr.trim();
    if addr.is_empty() {
        return Err(ConfigError::InvalidPeer(entry.to_string()));
    }
    Ok(Peer::new(id, addr))
}

/// Parses a comma separated list of `id=addr` entries. Blank entries are skipped.
pub fn parse_peers(list: &str) -> Result<Vec<Peer>, ConfigError> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(parse_peer)
        .collect()
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_config_default() {
        let config = NodeConfig::default_cluster();
        assert_eq!(config.node_id, 1);
        assert!(config.is_leader());
        assert_eq!(config.peer_ids(), vec![2, 3]);
        assert_eq!(config.replication_config().timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_peers() {
        let peers = parse_peers("2=127.0.0.1:7002, 3=127.0.0.1:7003,").unwrap();
        assert_eq!(
            peers,
            vec![Peer::new(2, "127.0.0.1:7002"), Peer::new(3, "127.0.0.1:7003")]
        );
        assert!(parse_peers("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_peer_rejects_garbage() {
        assert_eq!(
            parse_peer("node2:7002"),
            Err(ConfigError::InvalidPeer("node2:7002".to_string()))
        );
        assert!(parse_peer("x=127.0.0.1:1").is_err());
        assert!(parse_peer("2=").is_err());
    }

    #[test]
    fn test_validate_rejects_self_as_peer() {
        let mut config = NodeConfig::default_cluster();
        config.peers.push((1, "127.0.0.1:7001".to_string()));
        assert_eq!(config.validate(), Err(ConfigError::SelfAsPeer(1)));

        let mut follower = NodeConfig::standalone(2, "127.0.0.1:7002");
        follower.leader = Peer::new(1, "127.0.0.1:7001");
        follower.peers = vec![(1, "127.0.0.1:7001".to_string())];
        assert_eq!(follower.validate(), Ok(()));
    }

    // the only test in this crate that touches the process environment
    #[test]
    fn test_from_env() {
        std::env::set_var("NODE_ID", "2");
        std::env::set_var("LISTEN_ADDR", "127.0.0.1:7002");
        std::env::set_var("LEADER", "1=127.0.0.1:7001");
        std::env::set_var("PEERS", "3=127.0.0.1:7003");
        std::env::set_var("REPLICATION_TIMEOUT_MS", "250");
        std::env::remove_var("MAX_IN_FLIGHT");

        let config = NodeConfig::from_env().unwrap();
        assert_eq!(config.node_id, 2);
        assert_eq!(config.listen_addr, "127.0.0.1:7002");
        assert_eq!(config.leader, Peer::new(1, "127.0.0.1:7001"));
        assert!(!config.is_leader());
        assert_eq!(config.peer_ids(), vec![3]);
        assert_eq!(config.replication_config().timeout, Duration::from_millis(250));
        assert_eq!(config.max_in_flight, DEFAULT_MAX_IN_FLIGHT);

        std::env::set_var("REPLICATION_TIMEOUT_MS", "soon");
        assert_eq!(
            NodeConfig::from_env().unwrap_err(),
            ConfigError::InvalidValue {
                name: "REPLICATION_TIMEOUT_MS",
                value: "soon".to_string(),
            }
        );

        for name in ["NODE_ID", "LISTEN_ADDR", "LEADER", "PEERS", "REPLICATION_TIMEOUT_MS"] {
            std::env::remove_var(name);
        }
    }
}
