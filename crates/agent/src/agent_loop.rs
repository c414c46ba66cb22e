//! The orchestration loop: a bounded conversation state machine.
//!
//! Each iteration is one model round-trip. A terminal response completes
//! the run; a tool-call response executes every requested call in model
//! order and feeds the results back. The iteration cap is the only thing
//! standing between the loop and a model that never stops asking for
//! tools, so it is a required constructor argument.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use scout_provider::{ChatParams, Message, Provider, ToolCallDef, ToolChoice};

use crate::transport::ToolTransport;
use crate::{AgentError, Result};

/// How a run ended. Both variants are ordinary returns: only gateway or
/// transport breakage produces an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model produced a terminal response. Empty text is still a
    /// completion.
    Completed(String),
    /// The iteration cap was reached before a terminal response.
    MaxIterationsReached {
        /// Whatever non-empty content the model last produced alongside
        /// its tool calls, if any.
        last_content: Option<String>,
    },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

/// Result of one run, with the stats accumulated along the way.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Completed model round-trips (the terminal one included).
    pub iterations: u32,
    pub tool_calls: u32,
    pub total_tokens: u32,
}

pub struct AgentLoop<P: Provider> {
    provider: Arc<P>,
    transport: Arc<dyn ToolTransport>,
    model: String,
    max_iterations: u32,
    max_tokens: u32,
    temperature: f32,
    cancel: CancellationToken,
}

impl<P: Provider> AgentLoop<P> {
    pub fn new(
        provider: P,
        transport: Arc<dyn ToolTransport>,
        model: impl Into<String>,
        max_iterations: u32,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            transport,
            model: model.into(),
            max_iterations,
            max_tokens: 4096,
            temperature: 0.7,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a cancellation token; cancelling it aborts the run at the
    /// next gateway call or tool invocation.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Run one conversation to an outcome.
    pub async fn run(&self, query: &str) -> Result<RunReport> {
        let tools = self.transport.tools().await?;

        let mut messages = vec![Message::user(query)];
        let mut iterations: u32 = 0;
        let mut tool_calls_made: u32 = 0;
        let mut total_tokens: u32 = 0;
        let mut last_content: Option<String> = None;

        while iterations < self.max_iterations {
            debug!("iteration {}", iterations + 1);

            let params = ChatParams {
                model: self.model.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                tool_choice: ToolChoice::Auto,
            };

            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                response = self.provider.chat(params) => response?,
            };

            iterations += 1;
            total_tokens = total_tokens.saturating_add(response.usage.total_tokens);

            if !response.has_tool_calls() {
                let content = response.content.unwrap_or_default();
                info!(
                    "run completed: {} iterations, {} tool calls, {} tokens",
                    iterations, tool_calls_made, total_tokens
                );
                return Ok(RunReport {
                    outcome: RunOutcome::Completed(content),
                    iterations,
                    tool_calls: tool_calls_made,
                    total_tokens,
                });
            }

            last_content = response.content.clone().filter(|c| !c.is_empty());

            let call_defs: Vec<ToolCallDef> = response
                .tool_calls
                .iter()
                .map(|call| ToolCallDef::new(&call.id, &call.name, call.arguments.clone()))
                .collect();
            messages.push(Message::assistant_tool_calls(
                response.content.clone(),
                call_defs,
            ));

            // Execute in the order the model returned them; each result is
            // appended under its call id before the next call runs.
            for call in &response.tool_calls {
                debug!("tool call {} -> {}", call.id, call.name);

                let result = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                    result = self.transport.invoke(&call.name, call.arguments.clone()) => result?,
                };

                messages.push(Message::tool(&call.id, &call.name, result));
                tool_calls_made += 1;
            }
        }

        info!(
            "run hit the iteration cap: {} iterations, {} tool calls",
            iterations, tool_calls_made
        );
        Ok(RunReport {
            outcome: RunOutcome::MaxIterationsReached { last_content },
            iterations,
            tool_calls: tool_calls_made,
            total_tokens,
        })
    }
}
