//! Protocol server: serves a [`ToolSource`] over a framed stream.
//!
//! Runs as the child-process side of the transport, reading requests from
//! stdin and writing responses to stdout until EOF. Tool-level failures
//! are returned as text content; JSON-RPC errors are reserved for
//! protocol misuse (unknown method, bad params, unparseable body).

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{debug, info, warn};

use crate::codec::{read_frame, write_frame};
use crate::types::{
    CallToolParams, CallToolResult, ContentBlock, Implementation, InitializeResult,
    ListToolsResult, Request, Response, ServerCapabilities, ToolDescriptor, ToolsCapability,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::{McpError, Result};

/// Something that can enumerate and execute tools. Implemented by the
/// agent crate's tool registry; the server stays agnostic of what the
/// tools actually do.
#[async_trait]
pub trait ToolSource: Send + Sync {
    fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Execute a tool. Total: failures come back as descriptive text.
    async fn call_tool(&self, name: &str, arguments: Value) -> String;
}

pub struct McpServer<S> {
    source: S,
    server_name: String,
}

impl<S: ToolSource> McpServer<S> {
    pub fn new(source: S, server_name: impl Into<String>) -> Self {
        Self {
            source,
            server_name: server_name.into(),
        }
    }

    /// Serve on this process's stdin/stdout until the client closes the
    /// stream.
    pub async fn serve_stdio(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve one connection over arbitrary streams.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("tool server '{}' ready", self.server_name);

        loop {
            let frame = match read_frame(&mut reader).await {
                Ok(frame) => frame,
                Err(McpError::ConnectionClosed) => {
                    debug!("client closed the stream, shutting down");
                    return Ok(());
                }
                Err(McpError::MalformedFrame(msg)) => {
                    // Body length was known, so the stream is still in
                    // sync; report and keep serving.
                    warn!("discarding malformed frame: {}", msg);
                    let response = Response::failure(None, PARSE_ERROR, msg);
                    write_frame(&mut writer, &serde_json::to_value(&response)?).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let request: Request = match serde_json::from_value(frame) {
                Ok(request) => request,
                Err(e) => {
                    let response =
                        Response::failure(None, INVALID_REQUEST, format!("invalid request: {}", e));
                    write_frame(&mut writer, &serde_json::to_value(&response)?).await?;
                    continue;
                }
            };

            if request.is_notification() {
                debug!("notification: {}", request.method);
                continue;
            }

            let response = self.handle(&request).await;
            write_frame(&mut writer, &serde_json::to_value(&response)?).await?;
        }
    }

    async fn handle(&self, request: &Request) -> Response {
        let id = match request.id {
            Some(id) => id,
            None => return Response::failure(None, INVALID_REQUEST, "request without id"),
        };

        debug!("request {}: {}", id, request.method);

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params.clone()).await,
            other => Response::failure(
                Some(id),
                METHOD_NOT_FOUND,
                format!("unknown method '{}'", other),
            ),
        }
    }

    fn handle_initialize(&self, id: u64) -> Response {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: Implementation {
                name: self.server_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        match serde_json::to_value(&result) {
            Ok(value) => Response::success(id, value),
            Err(e) => Response::failure(Some(id), INVALID_PARAMS, e.to_string()),
        }
    }

    fn handle_list_tools(&self, id: u64) -> Response {
        let result = ListToolsResult {
            tools: self.source.list_tools(),
        };
        match serde_json::to_value(&result) {
            Ok(value) => Response::success(id, value),
            Err(e) => Response::failure(Some(id), INVALID_PARAMS, e.to_string()),
        }
    }

    async fn handle_call_tool(&self, id: u64, params: Value) -> Response {
        let params: CallToolParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return Response::failure(
                    Some(id),
                    INVALID_PARAMS,
                    format!("invalid tools/call params: {}", e),
                )
            }
        };

        let arguments = if params.arguments.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            params.arguments
        };

        let text = self.source.call_tool(&params.name, arguments).await;
        let result = CallToolResult {
            content: vec![ContentBlock::text(text)],
        };
        match serde_json::to_value(&result) {
            Ok(value) => Response::success(id, value),
            Err(e) => Response::failure(Some(id), INVALID_PARAMS, e.to_string()),
        }
    }
}
