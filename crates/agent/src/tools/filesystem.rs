//! Sandboxed filesystem tools: read, write, list, search.
//!
//! Every operation resolves its path and checks containment before any
//! I/O, and every failure mode is reported as text. The message wording
//! is stable — the model keys off it when deciding how to recover.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;

use tracing::debug;

use super::{ToolError, ToolTrait};
use crate::sandbox::resolve_sandboxed_path;

/// Denial text for any path resolving outside the sandbox root. Shared by
/// all four tools so the model sees one stable string.
pub const ACCESS_DENIED: &str = "Error: Access denied - path outside allowed directory";

/// Read the full contents of a file.
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct ReadFileArgs {
    file_path: String,
}

#[async_trait]
impl ToolTrait for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read the full contents of a file. Suitable for text files, configuration files and source code."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path to the file (absolute or relative to the sandbox root)" }
            },
            "required": ["file_path"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let args: ReadFileArgs = serde_json::from_value(args)?;
        let path = match resolve_sandboxed_path(&args.file_path, &self.root).await {
            Ok(path) => path,
            Err(violation) => {
                debug!("read_file denied: {}", violation);
                return Ok(ACCESS_DENIED.to_string());
            }
        };

        debug!("reading {:?}", path);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(format!("Error: File '{}' not found", args.file_path))
            }
            Err(e) => Ok(format!("Error reading file: {}", e)),
        }
    }
}

/// Write content to a file, creating parent directories as needed.
pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    file_path: String,
    content: String,
}

#[async_trait]
impl ToolTrait for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Write content to a file. Overwrites an existing file and creates missing parent directories."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Destination path" },
                "content": { "type": "string", "description": "Content to write" }
            },
            "required": ["file_path", "content"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let args: WriteFileArgs = serde_json::from_value(args)?;
        let path = match resolve_sandboxed_path(&args.file_path, &self.root).await {
            Ok(path) => path,
            Err(violation) => {
                debug!("write_file denied: {}", violation);
                return Ok(ACCESS_DENIED.to_string());
            }
        };

        debug!("writing {} bytes to {:?}", args.content.len(), path);
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(format!("Error writing file: {}", e));
            }
        }
        match tokio::fs::write(&path, &args.content).await {
            Ok(_) => Ok(format!(
                "Successfully wrote {} bytes to {}",
                args.content.len(),
                args.file_path
            )),
            Err(e) => Ok(format!("Error writing file: {}", e)),
        }
    }
}

/// List a directory, partitioned into subdirectories and files.
pub struct ListDirTool {
    root: PathBuf,
}

impl ListDirTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct ListDirArgs {
    #[serde(default = "default_list_path")]
    path: String,
}

fn default_list_path() -> String {
    ".".to_string()
}

#[async_trait]
impl ToolTrait for ListDirTool {
    fn name(&self) -> &str {
        "list_directory"
    }
    fn description(&self) -> &str {
        "List all files and subdirectories of a directory, with file sizes."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory path, defaults to the sandbox root (.)", "default": "." }
            },
            "required": []
        })
    }
    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let args: ListDirArgs = serde_json::from_value(args)?;
        let path = match resolve_sandboxed_path(&args.path, &self.root).await {
            Ok(path) => path,
            Err(violation) => {
                debug!("list_directory denied: {}", violation);
                return Ok(ACCESS_DENIED.to_string());
            }
        };

        debug!("listing {:?}", path);
        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) => return Ok(format!("Error listing directory: {}", e)),
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Ok(format!("Error listing directory: {}", e)),
            };
            let name = entry.file_name().to_string_lossy().to_string();
            match entry.metadata().await {
                Ok(meta) if meta.is_dir() => dirs.push(format!("{}/", name)),
                Ok(meta) => files.push(format!("{} ({} bytes)", name, meta.len())),
                Err(e) => return Ok(format!("Error listing directory: {}", e)),
            }
        }

        if dirs.is_empty() && files.is_empty() {
            return Ok(format!("Directory '{}' is empty", args.path));
        }

        dirs.sort();
        files.sort();

        let mut result = format!("Contents of '{}':\n\nDirectories:\n", args.path);
        let dirs_joined = dirs.join("\n");
        result.push_str(if dirs.is_empty() {
            "(none)"
        } else {
            &dirs_joined
        });
        result.push_str("\n\nFiles:\n");
        let files_joined = files.join("\n");
        result.push_str(if files.is_empty() {
            "(none)"
        } else {
            &files_joined
        });
        Ok(result)
    }
}

/// Search a file for lines containing a keyword.
pub struct SearchFileTool {
    root: PathBuf,
}

impl SearchFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct SearchFileArgs {
    file_path: String,
    keyword: String,
}

#[async_trait]
impl ToolTrait for SearchFileTool {
    fn name(&self) -> &str {
        "search_in_file"
    }
    fn description(&self) -> &str {
        "Search a file for every line containing a keyword; returns line numbers and matching lines."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "File to search" },
                "keyword": { "type": "string", "description": "Literal keyword to look for" }
            },
            "required": ["file_path", "keyword"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let args: SearchFileArgs = serde_json::from_value(args)?;
        let path = match resolve_sandboxed_path(&args.file_path, &self.root).await {
            Ok(path) => path,
            Err(violation) => {
                debug!("search_in_file denied: {}", violation);
                return Ok(ACCESS_DENIED.to_string());
            }
        };

        debug!("searching {:?} for '{}'", path, args.keyword);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => return Ok(format!("Error searching file: {}", e)),
        };

        let matches: Vec<String> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| line.contains(&args.keyword))
            .map(|(i, line)| format!("Line {}: {}", i + 1, line.trim()))
            .collect();

        if matches.is_empty() {
            Ok(format!(
                "No matches found for '{}' in {}",
                args.keyword, args.file_path
            ))
        } else {
            Ok(format!(
                "Found {} matches for '{}' in {}:\n{}",
                matches.len(),
                args.keyword,
                args.file_path,
                matches.join("\n")
            ))
        }
    }
}
