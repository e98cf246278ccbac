//! Per-node routing of client and peer requests.
//!
//! Every write is classified by the node's role and the request's origin:
//!
//! | role     | origin            | route                          |
//! |----------|-------------------|--------------------------------|
//! | leader   | any               | apply, then broadcast to peers |
//! | follower | the leader        | apply only                     |
//! | follower | client / other    | forward to the leader          |
//!
//! Reads are always served from the local engine.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::message::{Command, Origin, ReplicationEnvelope, Request, Response, WriteOp};
use crate::replication::{BroadcastHandle, ReplicationConfig, Replicator};
use crate::storage::{validate_key, StorageEngine};
use crate::topology::{ClusterView, Membership, NodeId, Peer, Role};
use crate::transport::PeerTransport;

/// What a node does with a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    ApplyAndBroadcast { targets: Vec<Peer> },
    ApplyLocally,
    Forward { leader: Peer },
}

impl Route {
    pub fn kind(&self) -> RouteKind {
        match self {
            Route::ApplyAndBroadcast { .. } => RouteKind::ApplyAndBroadcast,
            Route::ApplyLocally => RouteKind::ApplyLocally,
            Route::Forward { .. } => RouteKind::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    ApplyAndBroadcast,
    ApplyLocally,
    Forward,
}

/// Outcome of an accepted write.
#[derive(Debug)]
pub struct WriteReceipt {
    pub route: RouteKind,
    /// Always `true` for a put. For a delete, whether an entry was removed
    /// (as reported by the leader when the write was forwarded).
    pub success: bool,
    /// Present when this node started a broadcast.
    pub replication: Option<BroadcastHandle>,
}

pub struct Router<T> {
    membership: Membership,
    storage: StorageEngine,
    replicator: Replicator<T>,
}

impl<T: PeerTransport> Router<T> {
    pub fn new(
        membership: Membership,
        storage: StorageEngine,
        transport: Arc<T>,
        config: ReplicationConfig,
    ) -> Self {
        Self {
            membership,
            storage,
            replicator: Replicator::new(transport, config),
        }
    }

    pub fn id(&self) -> NodeId {
        self.membership.id()
    }

    pub fn is_leader(&self) -> bool {
        self.membership.is_leader()
    }

    pub fn role(&self) -> Role {
        self.membership.role()
    }

    pub fn view(&self) -> Arc<ClusterView> {
        self.membership.snapshot()
    }

    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    pub fn set_leader(&self, leader: Peer) {
        info!(node = self.id(), leader = %leader, "leader changed");
        self.membership.set_leader(leader);
    }

    pub fn add_follower(&self, id: NodeId, addr: impl Into<String>) {
        let addr = addr.into();
        info!(node = self.id(), follower = id, addr = %addr, "follower added");
        self.membership.add_follower(id, addr);
    }

    pub fn remove_follower(&self, id: NodeId) -> bool {
        let removed = self.membership.remove_follower(id);
        if removed {
            info!(node = self.id(), follower = id, "follower removed");
        }
        removed
    }

    /// Decides how a write from `origin` is handled under the current view.
    pub fn route(&self, origin: Origin) -> Route {
        let view = self.membership.snapshot();
        match &view.role {
            Role::Leader => Route::ApplyAndBroadcast {
                targets: view.broadcast_targets(self.id()),
            },
            Role::Follower { leader } if origin == Origin::Peer(leader.id) => Route::ApplyLocally,
            Role::Follower { leader } => Route::Forward {
                leader: leader.clone(),
            },
        }
    }

    pub async fn handle_put(
        &self,
        requester_id: Option<NodeId>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<WriteReceipt> {
        let op = WriteOp::Put {
            key: key.into(),
            value: value.into(),
        };
        self.handle_write(Origin::from_requester(requester_id), op).await
    }

    pub async fn handle_delete(
        &self,
        requester_id: Option<NodeId>,
        key: impl Into<String>,
    ) -> Result<WriteReceipt> {
        let op = WriteOp::Delete { key: key.into() };
        self.handle_write(Origin::from_requester(requester_id), op).await
    }

    /// Local read, whatever the role. Followers may return stale data.
    pub fn handle_get(&self, key: &str) -> Result<Option<String>> {
        self.storage.get(key)
    }

    /// Serves one wire request. Failures become [`Response::Error`].
    pub async fn handle(&self, request: Request) -> Response {
        let origin = request.origin();
        let result = match request.command {
            Command::Put { key, value } => self
                .handle_write(origin, WriteOp::Put { key, value })
                .await
                .map(|receipt| Response::Put {
                    success: receipt.success,
                }),
            Command::Delete { key } => self
                .handle_write(origin, WriteOp::Delete { key })
                .await
                .map(|receipt| Response::Delete {
                    success: receipt.success,
                }),
            Command::Get { key } => self.handle_get(&key).map(|value| Response::Get { value }),
        };

        result.unwrap_or_else(|err| {
            debug!(node = self.id(), ?origin, error = %err, "request failed");
            Response::error(&err)
        })
    }

    async fn handle_write(&self, origin: Origin, op: WriteOp) -> Result<WriteReceipt> {
        validate_key(op.key())?;

        let route = self.route(origin);
        let kind = route.kind();
        match route {
            Route::ApplyAndBroadcast { targets } => {
                let success = self.apply(&op)?;
                debug!(
                    node = self.id(),
                    ?origin,
                    op = op.name(),
                    key = op.key(),
                    peers = targets.len(),
                    "applied as leader"
                );
                let replication = if targets.is_empty() {
                    None
                } else {
                    let envelope = ReplicationEnvelope::new(self.id(), op);
                    Some(self.replicator.broadcast(envelope, targets))
                };
                Ok(WriteReceipt {
                    route: kind,
                    success,
                    replication,
                })
            }
            Route::ApplyLocally => {
                let success = self.apply(&op)?;
                debug!(
                    node = self.id(),
                    ?origin,
                    op = op.name(),
                    key = op.key(),
                    "applied from leader"
                );
                Ok(WriteReceipt {
                    route: kind,
                    success,
                    replication: None,
                })
            }
            Route::Forward { leader } => {
                let is_put = matches!(op, WriteOp::Put { .. });
                let envelope = ReplicationEnvelope::new(self.id(), op);
                // the leader must answer with the same kind of write
                let success = match (is_put, self.replicator.forward(envelope, &leader).await?) {
                    (true, Response::Put { success }) | (false, Response::Delete { success }) => {
                        success
                    }
                    (_, other) => {
                        return Err(Error::UnexpectedResponse {
                            peer: leader.id,
                            response: format!("{other:?}"),
                        })
                    }
                };
                Ok(WriteReceipt {
                    route: kind,
                    success,
                    replication: None,
                })
            }
        }
    }

    fn apply(&self, op: &WriteOp) -> Result<bool> {
        match op {
            WriteOp::Put { key, value } => {
                self.storage.put(key.as_str(), value.as_str())?;
                Ok(true)
            }
            WriteOp::Delete { key } => self.storage.delete(key),
        }
    }
}
