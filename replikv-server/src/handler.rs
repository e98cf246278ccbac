use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use replikv_core::{ErrorCode, PeerTransport, Request, Response, Router};

use crate::protocol::{encode_line, parse_line, render_text, Line};

/// Serves one connection until the other side closes it.
pub async fn handle_connection<T: PeerTransport>(socket: TcpStream, router: Arc<Router<T>>) {
    let remote = socket.peer_addr().ok();
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();

        match reader.read_line(&mut line).await {
            Ok(0) => return, // client closed connection
            Ok(_) => {}
            Err(e) => {
                debug!(?remote, error = %e, "read failed");
                return;
            }
        }

        let reply = respond(&router, &line).await;
        if let Err(e) = writer.write_all(&reply).await {
            debug!(?remote, error = %e, "write failed");
            return;
        }
    }
}

/// Executes one request line and returns the bytes to send back.
pub async fn respond<T: PeerTransport>(router: &Router<T>, line: &str) -> Vec<u8> {
    match parse_line(line) {
        Ok(Line::Json(request)) => json_reply(&router.handle(request).await),
        Ok(Line::Text(command)) => {
            let response = router.handle(Request::client(command)).await;
            format!("{}\n", render_text(&response)).into_bytes()
        }
        Err(err) if line.trim_start().starts_with('{') => json_reply(&Response::Error {
            code: ErrorCode::BadRequest,
            message: err,
        }),
        Err(err) => format!("ERROR: {}\n", err).into_bytes(),
    }
}

fn json_reply(response: &Response) -> Vec<u8> {
    encode_line(response).unwrap_or_else(|e| format!("ERROR: {}\n", e).into_bytes())
}
