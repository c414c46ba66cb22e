//! Protocol client: owns a server child process and speaks the framed
//! stream over its stdin/stdout.
//!
//! Requests are strictly sequential — the exclusive borrow on the request
//! path means a second request cannot be issued before the prior response
//! arrives, which keeps request/response correlation 1:1.

use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::codec::{read_frame, write_frame};
use crate::types::{
    CallToolResult, Implementation, InitializeResult, ListToolsResult, Request, Response,
    ToolDescriptor, PROTOCOL_VERSION,
};
use crate::{McpError, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct McpClient {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
    request_timeout: Duration,
    server_info: Option<Implementation>,
}

impl McpClient {
    /// Spawn the server process and run the initialization handshake.
    pub async fn connect(program: &str, args: &[String]) -> Result<Self> {
        Self::connect_with_timeout(program, args, DEFAULT_REQUEST_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        program: &str,
        args: &[String],
        request_timeout: Duration,
    ) -> Result<Self> {
        debug!("spawning tool server: {} {:?}", program, args);

        // kill_on_drop covers every abnormal exit path; shutdown() is the
        // orderly teardown.
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(McpError::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Protocol("failed to capture server stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Protocol("failed to capture server stdout".to_string()))?;

        let mut client = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
            request_timeout,
            server_info: None,
        };

        client.initialize().await?;
        Ok(client)
    }

    async fn initialize(&mut self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "scout",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let result = self.request("initialize", params).await?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("invalid initialize result: {}", e)))?;

        debug!(
            "connected to {} {}",
            init.server_info.name, init.server_info.version
        );
        self.server_info = Some(init.server_info);

        // Handshake completion notification; no response expected.
        let note = Request::notification("notifications/initialized");
        write_frame(&mut self.stdin, &serde_json::to_value(&note)?).await?;

        Ok(())
    }

    /// The server's self-reported name, once initialized.
    pub fn server_name(&self) -> Option<&str> {
        self.server_info.as_ref().map(|info| info.name.as_str())
    }

    /// Fetch the tool descriptors the server exposes.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let result = self.request("tools/list", json!({})).await?;
        let listing: ListToolsResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("invalid tools/list result: {}", e)))?;
        Ok(listing.tools)
    }

    /// Execute a tool and concatenate its text content blocks in order.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<String> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.request("tools/call", params).await?;
        let call: CallToolResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("invalid tools/call result: {}", e)))?;

        let text = call
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        Ok(text)
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = Request::new(id, method, params);
        write_frame(&mut self.stdin, &serde_json::to_value(&request)?).await?;

        loop {
            let frame = timeout(self.request_timeout, read_frame(&mut self.stdout))
                .await
                .map_err(|_| McpError::Timeout)??;

            // Server-initiated notifications may interleave with the
            // response; they carry no id and are not ours to answer.
            if frame.get("id").map_or(true, |id| id.is_null()) {
                debug!(
                    "ignoring server notification: {}",
                    frame.get("method").and_then(|m| m.as_str()).unwrap_or("?")
                );
                continue;
            }

            let response: Response = serde_json::from_value(frame)
                .map_err(|e| McpError::MalformedFrame(format!("invalid response: {}", e)))?;

            match response.id {
                Some(got) if got == id => {}
                other => {
                    return Err(McpError::Protocol(format!(
                        "response id {:?} does not match request id {}",
                        other, id
                    )))
                }
            }

            if let Some(error) = response.error {
                return Err(McpError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }

            return response
                .result
                .ok_or_else(|| McpError::Protocol("response carries neither result nor error".to_string()));
        }
    }

    /// Close the channel and reap the child.
    pub async fn shutdown(self) -> Result<()> {
        let McpClient {
            mut child, stdin, ..
        } = self;

        // Dropping stdin sends EOF; a well-behaved server exits on it.
        drop(stdin);
        match timeout(Duration::from_secs(2), child.wait()).await {
            Ok(status) => {
                debug!("tool server exited: {:?}", status?);
            }
            Err(_) => {
                warn!("tool server did not exit on EOF, killing");
                child.kill().await?;
            }
        }
        Ok(())
    }
}
