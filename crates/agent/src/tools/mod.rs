//! Tool registry: name → (schema, handler) with argument validation and
//! error containment.
//!
//! Dispatch is total. Unknown tools, missing required arguments, and
//! handler faults all come back as descriptive text — the model reads the
//! failure and can retry with corrected arguments in the same loop.

pub mod filesystem;

pub use filesystem::{ListDirTool, ReadFileTool, SearchFileTool, WriteFileTool};

use async_trait::async_trait;
use scout_mcp::types::ToolDescriptor;
use scout_mcp::ToolSource;
use scout_provider::Tool;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error};

/// A fault inside a tool handler. Rendered to text at the registry
/// boundary, never propagated past it.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

type BoxedTool = Box<dyn ToolTrait + Send + Sync>;

#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON-Schema object describing the arguments, with `properties`
    /// and `required`.
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

pub struct ToolRegistry {
    tools: HashMap<String, BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.
    ///
    /// # Panics
    /// On a duplicate name — two handlers under one name is a programming
    /// error, not a runtime condition.
    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Box::new(tool)).is_some() {
            panic!("tool '{}' registered twice", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&(dyn ToolTrait + Send + Sync)> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Schemas for the model gateway, sorted by name so the schema order
    /// presented to the model is deterministic.
    pub fn definitions(&self) -> Vec<Tool> {
        let mut tools: Vec<&BoxedTool> = self.tools.values().collect();
        tools.sort_by_key(|t| t.name().to_string());
        tools
            .into_iter()
            .map(|t| Tool::new(t.name(), t.description(), t.parameters()))
            .collect()
    }

    /// Execute a tool by name. Total: every failure mode is rendered as
    /// text.
    pub async fn dispatch(&self, name: &str, args: Value) -> String {
        // Models occasionally send no argument payload at all for
        // zero-required tools; treat that as an empty object.
        let args = if args.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            args
        };

        let tool = match self.tools.get(name) {
            Some(tool) => tool,
            None => {
                debug!("dispatch of unknown tool '{}'", name);
                return format!("Error: Unknown tool '{}'", name);
            }
        };

        if let Some(field) = missing_required_field(&tool.parameters(), &args) {
            return format!(
                "Error: Missing required argument '{}' for tool '{}'",
                field, name
            );
        }

        match tool.execute(args).await {
            Ok(text) => text,
            Err(e) => {
                error!("tool '{}' faulted: {}", name, e);
                format!("Error executing tool '{}': {}", name, e)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// First declared-required field absent from `args`, if any. Checked
/// before the handler runs so a missing field never reaches it.
fn missing_required_field(schema: &Value, args: &Value) -> Option<String> {
    let required = schema.get("required")?.as_array()?;
    for field in required {
        let field = field.as_str()?;
        match args.get(field) {
            Some(value) if !value.is_null() => {}
            _ => return Some(field.to_string()),
        }
    }
    None
}

/// Expose the registry over the stdio protocol.
#[async_trait]
impl ToolSource for ToolRegistry {
    fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.definitions()
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: tool.function.name,
                description: tool.function.description,
                input_schema: tool.function.parameters,
            })
            .collect()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> String {
        self.dispatch(name, arguments).await
    }
}

/// Build the standard registry: the four sandboxed filesystem tools over
/// `root`.
pub fn filesystem_registry(root: &Path) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ReadFileTool::new(root.to_path_buf()));
    registry.register(WriteFileTool::new(root.to_path_buf()));
    registry.register(ListDirTool::new(root.to_path_buf()));
    registry.register(SearchFileTool::new(root.to_path_buf()));
    registry
}
