pub mod cluster_node;
pub mod config;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod transport;

pub use cluster_node::ClusterNode;
pub use config::{ConfigError, NodeConfig};
pub use transport::TcpTransport;
