use std::io;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::net::TcpStream;

use replikv_core::{PeerTransport, Request, Response, TransportError};

use crate::protocol::{read_message, write_message};

/// Peer calls over TCP: one connection per call, one JSON line each way.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

#[async_trait]
impl PeerTransport for TcpTransport {
    async fn call(&self, addr: &str, request: Request) -> Result<Response, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::Connect)?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        write_message(&mut writer, &request).await.map_err(framing_error)?;
        read_message(&mut reader)
            .await
            .map_err(framing_error)?
            .ok_or(TransportError::Closed)
    }
}

fn framing_error(err: io::Error) -> TransportError {
    match err.kind() {
        io::ErrorKind::InvalidData => TransportError::Codec(err.to_string()),
        _ => TransportError::Io(err),
    }
}
