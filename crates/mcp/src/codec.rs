//! Content-Length framing over async byte streams.
//!
//! Each message is `Content-Length: <n>\r\n\r\n` followed by exactly `n`
//! bytes of JSON. Header lines other than `Content-Length` are tolerated
//! and ignored.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{McpError, Result};

/// Upper bound on a single frame body. Anything larger is treated as a
/// malformed stream rather than attempted as one allocation.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// Write one framed JSON message.
pub async fn write_frame<W>(writer: &mut W, value: &Value) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(value)
        .map_err(|e| McpError::MalformedFrame(format!("unencodable message: {}", e)))?;
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed JSON message.
///
/// Returns `ConnectionClosed` on EOF at a frame boundary. A body that is
/// not valid JSON yields `MalformedFrame` with the stream still in sync
/// (the body was fully consumed); a missing or garbled header yields
/// `Protocol`, after which the stream cannot be resynchronized.
pub async fn read_frame<R>(reader: &mut R) -> Result<Value>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut first_line = true;

    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            if first_line {
                return Err(McpError::ConnectionClosed);
            }
            return Err(McpError::Protocol(
                "stream ended mid-header".to_string(),
            ));
        }
        first_line = false;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(value.trim().parse::<usize>().map_err(|_| {
                McpError::Protocol(format!("unparseable Content-Length: {}", value.trim()))
            })?);
        }
    }

    let length =
        content_length.ok_or_else(|| McpError::Protocol("missing Content-Length header".to_string()))?;
    if length > MAX_FRAME_LEN {
        return Err(McpError::FrameTooLarge(length));
    }

    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            McpError::ConnectionClosed
        } else {
            McpError::Io(e)
        }
    })?;

    serde_json::from_slice(&buffer)
        .map_err(|e| McpError::MalformedFrame(format!("invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, _server_write) = tokio::io::split(server);
        let (_client_read, mut client_write) = tokio::io::split(client);

        let message = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        write_frame(&mut client_write, &message).await.unwrap();

        let mut reader = BufReader::new(server_read);
        let decoded = read_frame(&mut reader).await.unwrap();
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn test_read_multiple_frames_in_sequence() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, _sw) = tokio::io::split(server);
        let (_cr, mut client_write) = tokio::io::split(client);

        for i in 0..3u64 {
            write_frame(&mut client_write, &json!({"id": i})).await.unwrap();
        }

        let mut reader = BufReader::new(server_read);
        for i in 0..3u64 {
            let decoded = read_frame(&mut reader).await.unwrap();
            assert_eq!(decoded["id"], i);
        }
    }

    #[tokio::test]
    async fn test_read_eof_is_connection_closed() {
        let (client, server) = tokio::io::duplex(64);
        let (server_read, _sw) = tokio::io::split(server);
        drop(client);

        let mut reader = BufReader::new(server_read);
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, McpError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_read_invalid_json_body_is_malformed_but_resyncs() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, _sw) = tokio::io::split(server);
        let (_cr, mut client_write) = tokio::io::split(client);

        let garbage = b"not json!";
        let header = format!("Content-Length: {}\r\n\r\n", garbage.len());
        client_write.write_all(header.as_bytes()).await.unwrap();
        client_write.write_all(garbage).await.unwrap();
        write_frame(&mut client_write, &json!({"ok": true})).await.unwrap();

        let mut reader = BufReader::new(server_read);
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, McpError::MalformedFrame(_)));

        // The bad body was consumed; the next frame decodes cleanly.
        let decoded = read_frame(&mut reader).await.unwrap();
        assert_eq!(decoded["ok"], true);
    }

    #[tokio::test]
    async fn test_read_missing_header_is_protocol_error() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, _sw) = tokio::io::split(server);
        let (_cr, mut client_write) = tokio::io::split(client);

        client_write.write_all(b"\r\n").await.unwrap();

        let mut reader = BufReader::new(server_read);
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_read_oversized_frame_rejected() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, _sw) = tokio::io::split(server);
        let (_cr, mut client_write) = tokio::io::split(client);

        let header = format!("Content-Length: {}\r\n\r\n", MAX_FRAME_LEN + 1);
        client_write.write_all(header.as_bytes()).await.unwrap();

        let mut reader = BufReader::new(server_read);
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, McpError::FrameTooLarge(_)));
    }

    #[tokio::test]
    async fn test_extra_headers_are_ignored() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, _sw) = tokio::io::split(server);
        let (_cr, mut client_write) = tokio::io::split(client);

        let payload = serde_json::to_vec(&json!({"id": 9})).unwrap();
        let header = format!(
            "Content-Type: application/json\r\nContent-Length: {}\r\n\r\n",
            payload.len()
        );
        client_write.write_all(header.as_bytes()).await.unwrap();
        client_write.write_all(&payload).await.unwrap();

        let mut reader = BufReader::new(server_read);
        let decoded = read_frame(&mut reader).await.unwrap();
        assert_eq!(decoded["id"], 9);
    }
}
