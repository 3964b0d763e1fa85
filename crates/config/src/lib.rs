//! Configuration management for tabletalk
//!
//! Loads and saves service parameters as JSON, with environment overrides
//! for the values that usually differ per deployment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, expand_home};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// LLM endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_model() -> String {
    "gpt-4.1".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.2
}

fn default_llm_timeout() -> u64 {
    60
}

/// Whether the model may request tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoicePolicy {
    #[default]
    Auto,
    None,
}

/// Tool-calling loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default)]
    pub tool_choice: ToolChoicePolicy,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            tool_choice: ToolChoicePolicy::default(),
            tool_timeout_secs: default_tool_timeout(),
            max_result_rows: default_max_result_rows(),
            system_prompt: None,
        }
    }
}

fn default_max_rounds() -> u32 {
    5
}

fn default_tool_timeout() -> u64 {
    30
}

fn default_max_result_rows() -> usize {
    100
}

/// Embedded database parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: String,
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_read_only")]
    pub read_only: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            table_name: default_table_name(),
            read_only: default_read_only(),
        }
    }
}

fn default_csv_path() -> String {
    "data/sample_data.csv".to_string()
}

fn default_table_name() -> String {
    "transactions".to_string()
}

fn default_read_only() -> bool {
    true
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_path()).await?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from a specific file; a missing file yields defaults
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        self.save_to(&config_path()).await
    }

    /// Save to a specific file, creating parent directories
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Apply `TABLETALK_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("TABLETALK_API_KEY") {
            self.provider.api_key = key;
        }
        if let Some(base) = get("TABLETALK_API_BASE") {
            self.provider.api_base = Some(base);
        }
        if let Some(model) = get("TABLETALK_MODEL") {
            self.provider.model = model;
        }
        if let Some(path) = get("TABLETALK_CSV_PATH") {
            self.database.csv_path = path;
        }
        if let Some(port) = get("TABLETALK_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                warn!("TABLETALK_PORT={} is not a valid port", port);
                ConfigError::InvalidOverride {
                    key: "TABLETALK_PORT".to_string(),
                    value: port.clone(),
                }
            })?;
        }
        Ok(())
    }

    /// Resolved CSV file path
    pub fn csv_path(&self) -> PathBuf {
        expand_home(&self.database.csv_path)
    }

    /// API key, if one is configured
    pub fn api_key(&self) -> Option<String> {
        if self.provider.api_key.is_empty() {
            None
        } else {
            Some(self.provider.api_key.clone())
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Listen address as `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Write the default config if none exists and return the effective config
pub async fn init() -> Result<Config> {
    let path = config_path();

    if path.exists() {
        warn!("config already exists at {:?}", path);
    } else {
        Config::default().save_to(&path).await?;
        info!("config written to {:?}", path);
    }

    Config::load().await
}
