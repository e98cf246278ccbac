//! Leader/follower replicated key-value store: storage engine, topology,
//! request routing and write replication.

pub mod error;
pub mod message;
pub mod replication;
pub mod routing;
pub mod storage;
pub mod topology;
pub mod transport;

pub use error::{Error, Result, TransportError};
pub use message::{
    Command, ErrorCode, Origin, ReplicationEnvelope, Request, Response, WriteOp,
};
pub use replication::{
    BroadcastHandle, BroadcastReport, PeerOutcome, ReplicationConfig, Replicator,
};
pub use routing::{Route, RouteKind, Router, WriteReceipt};
pub use storage::StorageEngine;
pub use topology::{ClusterView, Membership, NodeId, Peer, Role};
pub use transport::PeerTransport;
