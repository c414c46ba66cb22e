//! Usage metering by composition.
//!
//! `MeteredProvider` and `MeteredTransport` wrap the gateway and the
//! transport, tally into a shared [`UsageMeter`], and delegate. They take
//! no part in control flow, so a loop runs identically with or without
//! them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use scout_provider::{ChatParams, ChatResponse, Provider, Tool, Usage};

use crate::transport::{ToolTransport, TransportError};

#[derive(Debug, Default)]
pub struct UsageMeter {
    requests: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
    tool_calls: AtomicU64,
}

impl UsageMeter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record_usage(&self, usage: &Usage) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens
            .fetch_add(usage.prompt_tokens as u64, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.completion_tokens as u64, Ordering::Relaxed);
        self.total_tokens
            .fetch_add(usage.total_tokens as u64, Ordering::Relaxed);
    }

    fn record_tool_call(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub tool_calls: u64,
}

/// A gateway wrapper that tallies token usage per round-trip.
pub struct MeteredProvider<P> {
    inner: P,
    meter: Arc<UsageMeter>,
}

impl<P> MeteredProvider<P> {
    pub fn new(inner: P, meter: Arc<UsageMeter>) -> Self {
        Self { inner, meter }
    }
}

#[async_trait]
impl<P: Provider> Provider for MeteredProvider<P> {
    async fn chat(&self, params: ChatParams) -> scout_provider::Result<ChatResponse> {
        let response = self.inner.chat(params).await?;
        self.meter.record_usage(&response.usage);
        Ok(response)
    }

    fn default_model(&self) -> String {
        self.inner.default_model()
    }

    fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }
}

/// A transport wrapper that counts completed tool invocations.
pub struct MeteredTransport<T> {
    inner: T,
    meter: Arc<UsageMeter>,
}

impl<T> MeteredTransport<T> {
    pub fn new(inner: T, meter: Arc<UsageMeter>) -> Self {
        Self { inner, meter }
    }
}

#[async_trait]
impl<T: ToolTransport> ToolTransport for MeteredTransport<T> {
    async fn tools(&self) -> Result<Vec<Tool>, TransportError> {
        self.inner.tools().await
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, TransportError> {
        let result = self.inner.invoke(name, arguments).await?;
        self.meter.record_tool_call();
        Ok(result)
    }
}
