//! Configuration loading for boardwatch
//!
//! Resolution priority order:
//! 1. Environment variables (highest priority)
//! 2. TOML config file (`BOARDWATCH_CONFIG` path, or the platform
//!    config directory)
//! 3. Compiled defaults (fallback)
//!
//! The GitHub token has no default: startup fails without one.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 5760;

/// Complete service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database path (cache store)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    pub github: GithubConfig,

    pub inference: InferenceConfig,
}

/// GitHub GraphQL API settings
#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    /// Bearer token for the GraphQL API
    #[serde(default)]
    pub token: String,

    /// Repository owner (issues list)
    pub owner: String,

    /// Repository name (issues list)
    pub repo: String,

    /// Organization owning the project board
    pub project_owner: String,

    /// Projects-v2 board number
    pub project_number: u32,
}

/// Inference API settings (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("boardwatch").join("boardwatch.db"))
        .unwrap_or_else(|| PathBuf::from("boardwatch.db"))
}

fn default_inference_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Config {
    /// Load configuration from the config file, then apply environment
    /// variable overrides, then validate.
    pub fn load() -> Result<Config> {
        let path = config_file_path();
        let mut config: Config = match path {
            Some(ref p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", p.display(), e)))?
            }
            _ => {
                return Err(Error::Config(
                    "No config file found; set BOARDWATCH_CONFIG or create \
                     boardwatch/config.toml in the platform config directory"
                        .to_string(),
                ));
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (used by tests and by
    /// deployments that template the file)
    pub fn from_toml(content: &str) -> Result<Config> {
        let mut config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("BOARDWATCH_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(path) = std::env::var("BOARDWATCH_DB") {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            self.github.token = token;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.inference.api_key = key;
        }
        if let Ok(model) = std::env::var("BOARDWATCH_MODEL") {
            self.inference.model = model;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.github.token.is_empty() {
            return Err(Error::Config(
                "GitHub token is required (config `github.token` or GITHUB_TOKEN)".to_string(),
            ));
        }
        if self.inference.api_key.is_empty() {
            return Err(Error::Config(
                "Inference API key is required (config `inference.api_key` or OPENAI_API_KEY)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the config file: `BOARDWATCH_CONFIG` env var first, then the
/// platform config directory.
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("BOARDWATCH_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("boardwatch").join("config.toml"))
}
