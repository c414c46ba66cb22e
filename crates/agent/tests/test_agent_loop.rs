//! Orchestration loop tests against a scripted gateway.
//!
//! The provider replays a fixed sequence of responses and records every
//! request it receives, which lets the tests assert both the outcome and
//! the exact message history the loop built.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use scout_agent::tools::filesystem_registry;
use scout_agent::transport::{DirectTransport, ToolTransport, TransportError};
use scout_agent::{AgentError, AgentLoop, RunOutcome};
use scout_mcp::McpError;
use scout_provider::{
    ChatParams, ChatResponse, Provider, ProviderError, Tool, ToolCall, Usage,
};

/// Replays canned responses in order and records incoming params.
struct ScriptedProvider {
    script: Mutex<VecDeque<ChatResponse>>,
    seen: Arc<Mutex<Vec<ChatParams>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ChatResponse>) -> (Self, Arc<Mutex<Vec<ChatParams>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                script: Mutex::new(responses.into()),
                seen: seen.clone(),
            },
            seen,
        )
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, params: ChatParams) -> scout_provider::Result<ChatResponse> {
        self.seen.lock().unwrap().push(params);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Api("script exhausted".to_string()))
    }

    fn default_model(&self) -> String {
        "scripted".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }
}

fn with_usage(mut response: ChatResponse, total: u32) -> ChatResponse {
    response.usage = Usage {
        prompt_tokens: total / 2,
        completion_tokens: total - total / 2,
        total_tokens: total,
    };
    response
}

fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

fn direct_transport(temp: &TempDir) -> Arc<DirectTransport> {
    Arc::new(DirectTransport::new(filesystem_registry(temp.path())))
}

#[tokio::test]
async fn test_immediate_terminal_response() {
    let temp = TempDir::new().unwrap();
    let (provider, _) = ScriptedProvider::new(vec![with_usage(ChatResponse::text("done"), 20)]);

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 10);
    let report = agent.run("say done").await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed("done".to_string()));
    assert_eq!(report.iterations, 1);
    assert_eq!(report.tool_calls, 0);
    assert_eq!(report.total_tokens, 20);
}

#[tokio::test]
async fn test_empty_terminal_content_is_still_success() {
    let temp = TempDir::new().unwrap();
    let (provider, _) = ScriptedProvider::new(vec![ChatResponse {
        content: None,
        tool_calls: Vec::new(),
        finish_reason: "stop".to_string(),
        usage: Usage::default(),
    }]);

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 10);
    let report = agent.run("anything").await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed(String::new()));
}

#[tokio::test]
async fn test_single_tool_call_then_answer() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("notes.txt"), "remember the milk").unwrap();

    let (provider, seen) = ScriptedProvider::new(vec![
        with_usage(
            ChatResponse::tool_calls(vec![call(
                "call_1",
                "read_file",
                json!({"file_path": "notes.txt"}),
            )]),
            30,
        ),
        with_usage(ChatResponse::text("Your note says: remember the milk"), 25),
    ]);

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 10);
    let report = agent.run("what do my notes say?").await.unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::Completed("Your note says: remember the milk".to_string())
    );
    assert_eq!(report.iterations, 2);
    assert_eq!(report.tool_calls, 1);
    assert_eq!(report.total_tokens, 55);

    // Second round-trip must carry: user, assistant(tool_calls), tool.
    let seen = seen.lock().unwrap();
    let second = &seen[1].messages;
    assert_eq!(second.len(), 3);
    assert_eq!(second[0].role, "user");
    assert_eq!(second[1].role, "assistant");
    assert_eq!(
        second[1].tool_calls.as_ref().unwrap()[0].id,
        "call_1"
    );
    assert_eq!(second[2].role, "tool");
    assert_eq!(second[2].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(second[2].content.as_deref(), Some("remember the milk"));
}

#[tokio::test]
async fn test_tool_results_keep_request_order() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("a.txt"), "alpha").unwrap();
    std::fs::write(temp.path().join("b.txt"), "beta").unwrap();

    let (provider, seen) = ScriptedProvider::new(vec![
        ChatResponse::tool_calls(vec![
            call("call_a", "read_file", json!({"file_path": "a.txt"})),
            call("call_b", "read_file", json!({"file_path": "b.txt"})),
        ]),
        ChatResponse::text("both read"),
    ]);

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 10);
    let report = agent.run("read both files").await.unwrap();

    assert_eq!(report.tool_calls, 2);

    let seen = seen.lock().unwrap();
    let second = &seen[1].messages;
    // user, assistant, tool(call_a), tool(call_b) — in request order.
    assert_eq!(second.len(), 4);
    assert_eq!(second[2].tool_call_id.as_deref(), Some("call_a"));
    assert_eq!(second[2].content.as_deref(), Some("alpha"));
    assert_eq!(second[3].tool_call_id.as_deref(), Some("call_b"));
    assert_eq!(second[3].content.as_deref(), Some("beta"));
}

#[tokio::test]
async fn test_max_iterations_reached_with_one_call_per_turn() {
    let temp = TempDir::new().unwrap();

    let (provider, _) = ScriptedProvider::new(vec![ChatResponse::tool_calls(vec![call(
        "call_1",
        "list_directory",
        json!({}),
    )])]);

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 1);
    let report = agent.run("loop forever").await.unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::MaxIterationsReached { last_content: None }
    );
    assert_eq!(report.iterations, 1);
    assert_eq!(report.tool_calls, 1);
}

#[tokio::test]
async fn test_max_iterations_keeps_last_partial_content() {
    let temp = TempDir::new().unwrap();

    let (provider, _) = ScriptedProvider::new(vec![ChatResponse {
        content: Some("let me check that directory".to_string()),
        tool_calls: vec![call("call_1", "list_directory", json!({}))],
        finish_reason: "tool_calls".to_string(),
        usage: Usage::default(),
    }]);

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 1);
    let report = agent.run("explore").await.unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::MaxIterationsReached {
            last_content: Some("let me check that directory".to_string())
        }
    );
}

#[tokio::test]
async fn test_unknown_tool_keeps_loop_alive() {
    let temp = TempDir::new().unwrap();

    let (provider, seen) = ScriptedProvider::new(vec![
        ChatResponse::tool_calls(vec![call("call_1", "delete_file", json!({"file_path": "x"}))]),
        ChatResponse::text("that tool does not exist"),
    ]);

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 10);
    let report = agent.run("delete x").await.unwrap();

    // The loop recovered: the unknown tool became result text, not an abort.
    assert!(report.outcome.is_completed());
    assert_eq!(report.iterations, 2);

    let seen = seen.lock().unwrap();
    let tool_msg = &seen[1].messages[2];
    assert_eq!(
        tool_msg.content.as_deref(),
        Some("Error: Unknown tool 'delete_file'")
    );
}

#[tokio::test]
async fn test_missing_argument_keeps_loop_alive() {
    let temp = TempDir::new().unwrap();

    let (provider, seen) = ScriptedProvider::new(vec![
        ChatResponse::tool_calls(vec![call("call_1", "read_file", json!({}))]),
        ChatResponse::text("I need a path"),
    ]);

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 10);
    let report = agent.run("read something").await.unwrap();

    assert!(report.outcome.is_completed());

    let seen = seen.lock().unwrap();
    let tool_msg = &seen[1].messages[2];
    assert_eq!(
        tool_msg.content.as_deref(),
        Some("Error: Missing required argument 'file_path' for tool 'read_file'")
    );
}

/// A transport whose stream is already broken.
struct BrokenTransport;

#[async_trait]
impl ToolTransport for BrokenTransport {
    async fn tools(&self) -> Result<Vec<Tool>, TransportError> {
        Ok(Vec::new())
    }

    async fn invoke(&self, _name: &str, _arguments: Value) -> Result<String, TransportError> {
        Err(TransportError::Protocol(McpError::ConnectionClosed))
    }
}

#[tokio::test]
async fn test_transport_failure_aborts_run() {
    let (provider, _) = ScriptedProvider::new(vec![ChatResponse::tool_calls(vec![call(
        "call_1",
        "read_file",
        json!({"file_path": "x"}),
    )])]);

    let agent = AgentLoop::new(provider, Arc::new(BrokenTransport), "scripted", 10);
    let err = agent.run("read x").await.unwrap_err();

    // Distinct from a max-iterations outcome: this is a hard failure.
    assert!(matches!(err, AgentError::Transport(_)));
}

#[tokio::test]
async fn test_gateway_failure_aborts_run() {
    let temp = TempDir::new().unwrap();
    let (provider, _) = ScriptedProvider::new(vec![]);

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 10);
    let err = agent.run("anything").await.unwrap_err();

    assert!(matches!(err, AgentError::Provider(_)));
}

#[tokio::test]
async fn test_cancellation_aborts_before_gateway_call() {
    let temp = TempDir::new().unwrap();
    let (provider, seen) = ScriptedProvider::new(vec![ChatResponse::text("never returned")]);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 10)
        .with_cancellation(cancel);
    let err = agent.run("anything").await.unwrap_err();

    assert!(matches!(err, AgentError::Cancelled));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_loop_presents_tools_to_gateway() {
    let temp = TempDir::new().unwrap();
    let (provider, seen) = ScriptedProvider::new(vec![ChatResponse::text("ok")]);

    let agent = AgentLoop::new(provider, direct_transport(&temp), "scripted", 10);
    agent.run("hello").await.unwrap();

    let seen = seen.lock().unwrap();
    let names: Vec<&str> = seen[0]
        .tools
        .iter()
        .map(|t| t.function.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["list_directory", "read_file", "search_in_file", "write_file"]
    );
    assert_eq!(seen[0].messages.len(), 1);
    assert_eq!(seen[0].messages[0].role, "user");
}
