//! Path containment for sandbox-safe filesystem operations.

use std::path::{Path, PathBuf};

/// A path resolved outside the sandbox root.
#[derive(Debug, Clone)]
pub struct SandboxViolation {
    pub path: String,
    pub root: String,
}

impl std::fmt::Display for SandboxViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "path {} is outside sandbox root {}",
            self.path, self.root
        )
    }
}

impl std::error::Error for SandboxViolation {}

/// Resolve a candidate path and require it to be the sandbox root or
/// nested under it.
///
/// Steps:
/// 1. Expand `~/` to the home directory; join relative paths to the root.
/// 2. Make the result absolute — `canonicalize` when it exists (resolving
///    symlinks and `..`), otherwise canonicalize through the nearest
///    existing parent and re-append the file name.
/// 3. Compare path components against the canonical root.
///
/// Returns the resolved absolute path, or a violation carrying both paths
/// for logging. No filesystem mutation happens here.
pub async fn resolve_sandboxed_path(
    path: &str,
    root: &Path,
) -> Result<PathBuf, SandboxViolation> {
    let expanded = if !path.starts_with('/') && !path.starts_with('~') {
        root.join(path)
    } else {
        expand_tilde(path)
    };

    let absolute = if expanded.exists() {
        tokio::fs::canonicalize(&expanded)
            .await
            .unwrap_or_else(|_| expanded.clone())
    } else {
        let parent = expanded.parent().filter(|p| !p.as_os_str().is_empty());
        let file_name = expanded.file_name();

        match (parent, file_name) {
            (Some(parent), Some(file_name)) => {
                let canonical_parent = if parent.exists() {
                    tokio::fs::canonicalize(parent)
                        .await
                        .unwrap_or_else(|_| parent.to_path_buf())
                } else {
                    normalize_components(parent)
                };
                canonical_parent.join(file_name)
            }
            _ => expanded.clone(),
        }
    };

    let canonical_root = if root.exists() {
        tokio::fs::canonicalize(root)
            .await
            .unwrap_or_else(|_| root.to_path_buf())
    } else {
        root.to_path_buf()
    };

    if !is_within(&absolute, &canonical_root) {
        return Err(SandboxViolation {
            path: path.to_string(),
            root: canonical_root.display().to_string(),
        });
    }

    Ok(absolute)
}

/// Component-wise prefix check. A bare string prefix would let
/// `/data/workspace-evil` pass for root `/data/workspace`.
fn is_within(path: &Path, root: &Path) -> bool {
    let path_components: Vec<_> = path.components().collect();
    let root_components: Vec<_> = root.components().collect();

    if path_components.len() < root_components.len() {
        return false;
    }

    root_components
        .iter()
        .enumerate()
        .all(|(i, comp)| path_components.get(i) == Some(comp))
}

/// Lexically resolve `.` and `..` for paths that do not exist yet.
fn normalize_components(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
