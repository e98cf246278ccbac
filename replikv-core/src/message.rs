use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::topology::NodeId;

// =============================================================================
// Request origin
// =============================================================================

/// Who issued a request, as far as routing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Client,
    Peer(NodeId),
}

impl Origin {
    /// An absent requester id, or the reserved id `0`, marks a client call.
    pub fn from_requester(requester_id: Option<NodeId>) -> Self {
        match requester_id {
            None | Some(0) => Origin::Client,
            Some(id) => Origin::Peer(id),
        }
    }
}

// =============================================================================
// Replication
// =============================================================================

/// A write that can be replicated or forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    Put { key: String, value: String },
    Delete { key: String },
}

impl WriteOp {
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key } => key,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::Put { .. } => "put",
            WriteOp::Delete { .. } => "delete",
        }
    }
}

/// A write on its way to another node, stamped with the sending node's id
/// so the receiver can tell leader traffic from client traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationEnvelope {
    pub requester_id: NodeId,
    pub op: WriteOp,
}

impl ReplicationEnvelope {
    pub fn new(requester_id: NodeId, op: WriteOp) -> Self {
        Self { requester_id, op }
    }

    pub fn to_request(&self) -> Request {
        let command = match &self.op {
            WriteOp::Put { key, value } => Command::Put {
                key: key.clone(),
                value: value.clone(),
            },
            WriteOp::Delete { key } => Command::Delete { key: key.clone() },
        };
        Request::from_peer(self.requester_id, command)
    }
}

// =============================================================================
// Wire messages
// =============================================================================

/// One call on the node's remote surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<NodeId>,
    pub command: Command,
}

impl Request {
    pub fn client(command: Command) -> Self {
        Self {
            requester_id: None,
            command,
        }
    }

    pub fn from_peer(requester_id: NodeId, command: Command) -> Self {
        Self {
            requester_id: Some(requester_id),
            command,
        }
    }

    pub fn origin(&self) -> Origin {
        Origin::from_requester(self.requester_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Put { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Put { success: bool },
    Get { value: Option<String> },
    Delete { success: bool },
    Error { code: ErrorCode, message: String },
}

impl Response {
    pub fn error(err: &Error) -> Self {
        Response::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidKey,
    Unavailable,
    Unreachable,
    Timeout,
    BadRequest,
}
