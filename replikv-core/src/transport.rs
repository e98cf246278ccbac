use async_trait::async_trait;

use crate::error::TransportError;
use crate::message::{Request, Response};

/// How a node reaches its peers.
///
/// One call carries one request and yields one response. Implementations do
/// not apply timeouts; the replication layer bounds every call.
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    async fn call(&self, addr: &str, request: Request) -> Result<Response, TransportError>;
}
