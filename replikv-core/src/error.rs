//! Error taxonomy for the storage, routing and replication layers.

use std::time::Duration;

use thiserror::Error;

use crate::message::ErrorCode;
use crate::topology::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A keyed operation was called with the empty key.
    #[error("key cannot be empty")]
    InvalidKey,

    /// The local engine could not complete a write.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A peer call did not complete within the replication bound.
    #[error("call to node {peer} at {addr} timed out after {timeout:?}")]
    ReplicationTimeout {
        peer: NodeId,
        addr: String,
        timeout: Duration,
    },

    /// A peer could not be reached or the exchange broke off.
    #[error("node {peer} at {addr} unreachable: {reason}")]
    ReplicationUnreachable {
        peer: NodeId,
        addr: String,
        reason: String,
    },

    /// A peer answered with a response of the wrong kind.
    #[error("node {peer} sent an unexpected response: {response}")]
    UnexpectedResponse { peer: NodeId, response: String },

    /// A peer answered with an error that has no closer local equivalent.
    #[error("rejected by remote node ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },
}

impl Error {
    /// Wire code used when this error is returned to a caller.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidKey => ErrorCode::InvalidKey,
            Error::StorageUnavailable(_) => ErrorCode::Unavailable,
            Error::ReplicationTimeout { .. } => ErrorCode::Timeout,
            Error::ReplicationUnreachable { .. } => ErrorCode::Unreachable,
            Error::UnexpectedResponse { .. } => ErrorCode::BadRequest,
            Error::Rejected { code, .. } => *code,
        }
    }

    /// Rebuilds an error received from a peer so that a forwarded request
    /// fails the same way it would have failed locally.
    pub fn from_wire(code: ErrorCode, message: String) -> Self {
        match code {
            ErrorCode::InvalidKey => Error::InvalidKey,
            ErrorCode::Unavailable => Error::StorageUnavailable(message),
            code => Error::Rejected { code, message },
        }
    }
}

/// Failures raised by a [`crate::transport::PeerTransport`] implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("connection closed before a response arrived")]
    Closed,
}
