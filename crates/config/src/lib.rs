//! Configuration for scout.
//!
//! Settings come from a JSON file under `~/.scout`, with environment
//! variables taking precedence so deployments can override without
//! touching the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub mod paths;

pub use paths::{config_path, data_dir};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Model backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Agent defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    /// Directory the agent may operate in. Relative values are resolved
    /// against the working directory at startup.
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            root: default_root(),
            model: default_model(),
            max_iterations: default_max_iterations(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            verbose: false,
        }
    }
}

fn default_root() -> String {
    ".".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_iterations() -> u32 {
    10
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentDefaults,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub async fn load() -> Result<Self> {
        let path = config_path();
        let mut config = Self::load_from(&path).await?;
        config.apply_env();
        Ok(config)
    }

    /// Load from a specific location. A missing file yields defaults.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location.
    pub async fn save(&self) -> Result<()> {
        self.save_to(&config_path()).await
    }

    /// Save to a specific location, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Environment overrides. Recognized variables:
    /// `SCOUT_ROOT`, `SCOUT_MODEL`, `SCOUT_MAX_ITERATIONS`,
    /// `SCOUT_VERBOSE`, `OPENAI_API_KEY`, `BASE_URL`.
    pub fn apply_env(&mut self) {
        if let Ok(root) = std::env::var("SCOUT_ROOT") {
            self.agent.root = root;
        }
        if let Ok(model) = std::env::var("SCOUT_MODEL") {
            self.agent.model = model;
        }
        if let Ok(max) = std::env::var("SCOUT_MAX_ITERATIONS") {
            if let Ok(max) = max.parse() {
                self.agent.max_iterations = max;
            }
        }
        if let Ok(verbose) = std::env::var("SCOUT_VERBOSE") {
            self.agent.verbose = matches!(verbose.as_str(), "1" | "true" | "yes");
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.provider.api_key = key;
        }
        if let Ok(base) = std::env::var("BASE_URL") {
            self.provider.api_base = Some(base);
        }
    }

    /// The sandbox root as an absolute path: the configured value
    /// resolved against the current working directory.
    pub fn sandbox_root(&self) -> std::io::Result<PathBuf> {
        let raw = PathBuf::from(&self.agent.root);
        if raw.is_absolute() {
            Ok(raw)
        } else {
            Ok(std::env::current_dir()?.join(raw))
        }
    }

    pub fn api_key(&self) -> Option<String> {
        if self.provider.api_key.is_empty() {
            None
        } else {
            Some(self.provider.api_key.clone())
        }
    }

    pub fn api_base(&self) -> Option<String> {
        self.provider.api_base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.root, ".");
        assert_eq!(config.agent.model, "gpt-4o-mini");
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.max_tokens, 4096);
        assert!(!config.agent.verbose);
        assert!(config.api_key().is_none());
        assert!(config.api_base().is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"agent": {"model": "gpt-4o"}}"#).unwrap();
        assert_eq!(config.agent.model, "gpt-4o");
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.root, ".");
    }

    #[test]
    fn test_sandbox_root_absolute_passthrough() {
        let mut config = Config::default();
        config.agent.root = "/tmp/scout-root".to_string();
        assert_eq!(
            config.sandbox_root().unwrap(),
            PathBuf::from("/tmp/scout-root")
        );
    }

    #[test]
    fn test_sandbox_root_relative_resolves_against_cwd() {
        let config = Config::default();
        let root = config.sandbox_root().unwrap();
        assert!(root.is_absolute());
        assert_eq!(root, std::env::current_dir().unwrap().join("."));
    }

    #[test]
    fn test_api_key_empty_is_none() {
        let mut config = Config::default();
        assert!(config.api_key().is_none());
        config.provider.api_key = "sk-test".to_string();
        assert_eq!(config.api_key(), Some("sk-test".to_string()));
    }
}
