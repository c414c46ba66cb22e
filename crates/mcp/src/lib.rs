//! Stdio tool protocol for scout.
//!
//! A JSON-RPC 2.0 message stream framed with `Content-Length` headers over
//! a child process's standard input/output. The client side owns the child
//! process; the server side exposes a [`ToolSource`] as
//! `initialize` / `tools/list` / `tools/call`.
//!
//! Every error here is a transport failure: the channel itself is broken
//! or misused. Tool-level failures never appear as errors on this layer —
//! they travel as text inside `tools/call` results.

use thiserror::Error;

pub mod client;
pub mod codec;
pub mod server;
pub mod types;

pub use client::McpClient;
pub use server::{McpServer, ToolSource};
pub use types::ToolDescriptor;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("failed to spawn server process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("protocol stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),

    #[error("server closed the connection")]
    ConnectionClosed,

    #[error("timed out waiting for server response")]
    Timeout,

    #[error("server returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("protocol violation: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, McpError>;
