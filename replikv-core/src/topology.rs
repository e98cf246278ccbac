//! Node identity, role and the set of known peers.
//!
//! A node's role, leader and peer map are published together as one
//! immutable [`ClusterView`]. Administrative changes build a new view and
//! swap it in, so a reader always sees a role that agrees with its leader.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub type NodeId = u64;

/// A cluster member and the address it listens on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub id: NodeId,
    pub addr: String,
}

impl Peer {
    pub fn new(id: NodeId, addr: impl Into<String>) -> Self {
        Self {
            id,
            addr: addr.into(),
        }
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.addr)
    }
}

/// The two roles a node can hold. A follower always knows its leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower { leader: Peer },
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Leader => write!(f, "LEADER"),
            Role::Follower { .. } => write!(f, "FOLLOWER"),
        }
    }
}

/// Immutable snapshot of what a node believes about the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterView {
    pub role: Role,
    pub peers: BTreeMap<NodeId, String>,
}

impl ClusterView {
    pub fn new(role: Role, peers: BTreeMap<NodeId, String>) -> Self {
        Self { role, peers }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role, Role::Leader)
    }

    /// Id of the current leader; a leader reports itself.
    pub fn leader_id(&self, self_id: NodeId) -> NodeId {
        match &self.role {
            Role::Leader => self_id,
            Role::Follower { leader } => leader.id,
        }
    }

    /// The leader a follower forwards to. `None` on the leader itself.
    pub fn leader(&self) -> Option<&Peer> {
        match &self.role {
            Role::Leader => None,
            Role::Follower { leader } => Some(leader),
        }
    }

    /// Every known peer except `self_id`.
    pub fn broadcast_targets(&self, self_id: NodeId) -> Vec<Peer> {
        self.peers
            .iter()
            .filter(|(id, _)| **id != self_id)
            .map(|(id, addr)| Peer::new(*id, addr.clone()))
            .collect()
    }
}

/// Owner of a node's identity and its current [`ClusterView`].
#[derive(Debug)]
pub struct Membership {
    id: NodeId,
    view: RwLock<Arc<ClusterView>>,
}

impl Membership {
    pub fn new(id: NodeId, view: ClusterView) -> Self {
        Self {
            id,
            view: RwLock::new(Arc::new(view)),
        }
    }

    /// A node that leads the given followers.
    pub fn leader(id: NodeId, followers: impl IntoIterator<Item = Peer>) -> Self {
        let peers = followers.into_iter().map(|p| (p.id, p.addr)).collect();
        Self::new(id, ClusterView::new(Role::Leader, peers))
    }

    /// A node that follows `leader`.
    pub fn follower(id: NodeId, leader: Peer) -> Self {
        let mut peers = BTreeMap::new();
        peers.insert(leader.id, leader.addr.clone());
        Self::new(id, ClusterView::new(Role::Follower { leader }, peers))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn snapshot(&self) -> Arc<ClusterView> {
        self.view.read().clone()
    }

    pub fn role(&self) -> Role {
        self.snapshot().role.clone()
    }

    pub fn is_leader(&self) -> bool {
        self.snapshot().is_leader()
    }

    /// Makes `leader` the cluster leader. Naming this node turns it into the
    /// leader; naming any other node turns it into that node's follower.
    pub fn set_leader(&self, leader: Peer) {
        self.update(|view| {
            if leader.id == self.id {
                view.role = Role::Leader;
            } else {
                view.peers.insert(leader.id, leader.addr.clone());
                view.role = Role::Follower { leader };
            }
        });
    }

    pub fn add_follower(&self, id: NodeId, addr: impl Into<String>) {
        let addr = addr.into();
        self.update(|view| {
            view.peers.insert(id, addr);
        });
    }

    pub fn remove_follower(&self, id: NodeId) -> bool {
        let mut removed = false;
        self.update(|view| {
            removed = view.peers.remove(&id).is_some();
        });
        removed
    }

    fn update(&self, change: impl FnOnce(&mut ClusterView)) {
        let mut guard = self.view.write();
        let mut next = (**guard).clone();
        change(&mut next);
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_targets_skip_self() {
        let membership = Membership::leader(
            1,
            vec![
                Peer::new(1, "127.0.0.1:7001"),
                Peer::new(2, "127.0.0.1:7002"),
                Peer::new(3, "127.0.0.1:7003"),
            ],
        );
        let ids: Vec<NodeId> = membership
            .snapshot()
            .broadcast_targets(1)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_set_leader_switches_role() {
        let membership = Membership::leader(1, vec![Peer::new(2, "b:1")]);
        assert!(membership.is_leader());

        membership.set_leader(Peer::new(2, "b:1"));
        assert_eq!(
            membership.role(),
            Role::Follower {
                leader: Peer::new(2, "b:1")
            }
        );
        assert_eq!(membership.snapshot().leader_id(1), 2);

        membership.set_leader(Peer::new(1, "a:1"));
        assert!(membership.is_leader());
        assert_eq!(membership.snapshot().leader(), None);
    }

    #[test]
    fn test_old_snapshot_is_not_mutated() {
        let membership = Membership::leader(1, vec![]);
        let before = membership.snapshot();
        membership.add_follower(4, "d:1");

        assert!(before.peers.is_empty());
        assert_eq!(membership.snapshot().peers.get(&4), Some(&"d:1".to_string()));
        assert!(membership.remove_follower(4));
        assert!(!membership.remove_follower(4));
    }
}
