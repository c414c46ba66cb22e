//! Agent core: sandboxed filesystem tools, the tool registry, the
//! transport adapter, and the bounded orchestration loop.

use thiserror::Error;

pub mod agent_loop;
pub mod sandbox;
pub mod telemetry;
pub mod tools;
pub mod transport;

pub use agent_loop::{AgentLoop, RunOutcome, RunReport};
pub use telemetry::{MeteredProvider, MeteredTransport, UsageMeter, UsageSnapshot};
pub use tools::{ToolRegistry, ToolTrait};
pub use transport::{DirectTransport, McpTransport, ToolTransport, TransportError};

/// Errors that abort a conversation. Tool-level failures never appear
/// here — they are recovered into tool-result text so the model can see
/// them and retry.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("model gateway failed: {0}")]
    Provider(#[from] scout_provider::ProviderError),

    #[error("tool transport failed: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AgentError>;
