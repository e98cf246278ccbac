//! Line protocol spoken on a node's port.
//!
//! A line that starts with `{` is a JSON [`Request`] and gets a JSON
//! [`Response`] line back; this is what peers send. Anything else is a
//! plain text command for humans (`SET k v`, `GET k`, `DELETE k`).

use std::io;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use replikv_core::{Command, Request, Response};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

pub enum Line {
    Json(Request),
    Text(Command),
}

/// Parses one text command.
pub fn parse(line: &str) -> Result<Command, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.is_empty() {
        return Err("Empty command".into());
    }

    match parts[0].to_uppercase().as_str() {
        "SET" | "PUT" if parts.len() == 3 => Ok(Command::Put {
            key: parts[1].to_string(),
            value: parts[2].to_string(),
        }),
        "GET" if parts.len() == 2 => Ok(Command::Get {
            key: parts[1].to_string(),
        }),
        "DELETE" | "DEL" if parts.len() == 2 => Ok(Command::Delete {
            key: parts[1].to_string(),
        }),
        _ => Err("Invalid command. Use: SET <key> <value>, GET <key>, or DELETE <key>".to_string()),
    }
}

/// Classifies a raw line as JSON or text and parses it.
pub fn parse_line(line: &str) -> Result<Line, String> {
    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        decode_line(trimmed)
            .map(Line::Json)
            .map_err(|e| format!("Invalid request: {}", e))
    } else {
        parse(trimmed).map(Line::Text)
    }
}

/// Text rendering of a response, without the trailing newline.
pub fn render_text(response: &Response) -> String {
    match response {
        Response::Put { .. } | Response::Delete { success: true } => "OK".to_string(),
        Response::Delete { success: false } | Response::Get { value: None } => {
            "NOT_FOUND".to_string()
        }
        Response::Get { value: Some(value) } => value.clone(),
        Response::Error { message, .. } => format!("ERROR: {}", message),
    }
}

/// Serializes `message` as one newline-terminated JSON line.
pub fn encode_line<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut encoded = serde_json::to_vec(message)?;
    encoded.push(b'\n');
    Ok(encoded)
}

pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim_end_matches(LINE_ENDINGS))
}

/// Writes `message` as one JSON line and flushes.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode_line(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&bytes).await?;
    writer.flush().await
}

/// Reads one JSON line. `Ok(None)` means the peer closed the stream first;
/// a line that does not decode is an `InvalidData` error.
pub async fn read_message<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    decode_line(&line)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
