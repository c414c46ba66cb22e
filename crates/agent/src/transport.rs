//! Transport adapter: one contract for executing a requested tool,
//! whether the implementation lives in-process or behind a child-process
//! protocol stream.
//!
//! The orchestration loop is written once against [`ToolTransport`] and
//! never learns which strategy is active.

use async_trait::async_trait;
use scout_provider::Tool;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::tools::ToolRegistry;
use scout_mcp::McpClient;

/// The transport itself broke: the channel, not a single tool, is
/// unusable. Fatal to the conversation.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("protocol transport failed: {0}")]
    Protocol(#[from] scout_mcp::McpError),
}

#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// The tool schemas this transport can execute, for the model
    /// gateway.
    async fn tools(&self) -> Result<Vec<Tool>, TransportError>;

    /// Execute one tool call. Tool-level failures are `Ok` with error
    /// text; an `Err` means the transport itself is broken.
    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, TransportError>;
}

/// In-process strategy: direct calls into the tool registry. Cannot fail
/// at the transport level.
pub struct DirectTransport {
    registry: ToolRegistry,
}

impl DirectTransport {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolTransport for DirectTransport {
    async fn tools(&self) -> Result<Vec<Tool>, TransportError> {
        Ok(self.registry.definitions())
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, TransportError> {
        Ok(self.registry.dispatch(name, arguments).await)
    }
}

/// Out-of-process strategy: a protocol client talking to a tool server
/// child process. The mutex serializes requests — one in flight per
/// connection, responses matched 1:1 in order.
pub struct McpTransport {
    client: Mutex<McpClient>,
}

impl McpTransport {
    pub fn new(client: McpClient) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }

    /// Spawn the server and complete the handshake.
    pub async fn connect(program: &str, args: &[String]) -> Result<Self, TransportError> {
        let client = McpClient::connect(program, args).await?;
        debug!(
            "protocol transport connected to '{}'",
            client.server_name().unwrap_or("unknown server")
        );
        Ok(Self::new(client))
    }

    pub async fn connect_with_timeout(
        program: &str,
        args: &[String],
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = McpClient::connect_with_timeout(program, args, request_timeout).await?;
        Ok(Self::new(client))
    }

    /// Tear the child process down. Also happens implicitly on drop.
    pub async fn shutdown(self) -> Result<(), TransportError> {
        self.client.into_inner().shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl ToolTransport for McpTransport {
    async fn tools(&self) -> Result<Vec<Tool>, TransportError> {
        let mut client = self.client.lock().await;
        let descriptors = client.list_tools().await?;
        Ok(descriptors
            .into_iter()
            .map(|d| Tool::new(d.name, d.description, d.input_schema))
            .collect())
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, TransportError> {
        let mut client = self.client.lock().await;
        Ok(client.call_tool(name, arguments).await?)
    }
}
