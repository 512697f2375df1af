//! Transport layer for MCP JSON-RPC communication.
//!
//! MCP uses newline-delimited JSON over stdin/stdout. Nothing but protocol
//! frames may ever be written to the writer half.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Message that can be received from the client.
#[derive(Debug)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// Transport for reading/writing JSON-RPC messages.
pub struct StdioTransport<R, W> {
    reader: R,
    writer: W,
}

impl StdioTransport<BufReader<Stdin>, Stdout> {
    /// Create a transport using stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a transport with custom reader/writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Consume the transport, returning the writer half.
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Read the next JSON-RPC message. Blank lines are skipped.
    ///
    /// Returns `Ok(None)` on EOF and an `InvalidData` error for frames that
    /// are neither a request nor a notification.
    pub async fn read_message(&mut self) -> io::Result<Option<IncomingMessage>> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            tracing::debug!("Received: {}", line);

            // Requests carry an id, notifications do not
            if let Ok(request) = serde_json::from_str::<JsonRpcRequest>(line) {
                return Ok(Some(IncomingMessage::Request(request)));
            }

            if let Ok(notification) = serde_json::from_str::<JsonRpcNotification>(line) {
                return Ok(Some(IncomingMessage::Notification(notification)));
            }

            tracing::warn!("Failed to parse message: {}", line);
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid JSON-RPC message: {}", line),
            ));
        }
    }

    /// Write a JSON-RPC response as a single line.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("Serialization error: {}", e))
        })?;

        tracing::debug!("Sending: {}", json);

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}
