//! Configuration file parsing for the server and CLI.
//!
//! Loads `[llm]`, `[models]`, `[pipeline]`, `[server]` and `[storage]`
//! sections from a TOML file. Every section is optional.

use scrivener_llm::{LlmError, ModelRegistry, OpenAiProvider};
use scrivener_pipeline::PipelineSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to write TOML
    #[error("Failed to serialize config: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// Pipeline settings are inconsistent
    #[error("Invalid pipeline settings: {0}")]
    Invalid(String),

    /// API key environment variable is unset
    #[error("Environment variable {0} is not set")]
    MissingApiKey(String),

    /// Provider could not be constructed
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),
}

/// Chat-completion endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL
    pub endpoint: String,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,

    /// HTTP timeout per attempt
    pub timeout_secs: u64,

    /// Attempts per request
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
        }
    }
}

/// Object storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding input and output objects
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
        }
    }
}

/// Complete Scrivener configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrivenerConfig {
    /// Endpoint settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Model per pipeline role
    #[serde(default)]
    pub models: ModelRegistry,

    /// Pipeline limits and timeouts
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Object storage
    #[serde(default)]
    pub storage: StorageConfig,
}

impl ScrivenerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: ScrivenerConfig = toml::from_str(contents)?;
        config.pipeline.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
    }

    /// API key from the configured environment variable
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.llm.api_key_env.clone()))
    }

    /// Build the OpenAI-compatible provider described by `[llm]`
    pub fn build_provider(&self) -> Result<OpenAiProvider, ConfigError> {
        let provider = OpenAiProvider::with_timeout(
            self.llm.endpoint.clone(),
            self.api_key()?,
            Duration::from_secs(self.llm.timeout_secs),
        )?;
        Ok(provider.with_max_retries(self.llm.max_retries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScrivenerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.storage.root, PathBuf::from("data"));
        assert_eq!(config.pipeline.timeout_failure_threshold, 6);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [llm]
            endpoint = "http://localhost:11434"
            api_key_env = "LOCAL_LLM_KEY"

            [models]
            classifier = "ft:gpt-4o-mini:acme:clauses"

            [pipeline]
            max_text_length = 8000
            timeout_failure_threshold = 3

            [server]
            bind_address = "0.0.0.0"
            bind_port = 9000

            [storage]
            root = "/var/lib/scrivener"
        "#;

        let config = ScrivenerConfig::parse(toml).unwrap();
        assert_eq!(config.llm.endpoint, "http://localhost:11434");
        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.models.classifier, "ft:gpt-4o-mini:acme:clauses");
        assert_eq!(config.models.extractor, "gpt-4o-mini");
        assert_eq!(config.pipeline.max_text_length, 8000);
        assert_eq!(config.pipeline.timeout_failure_threshold, 3);
        assert_eq!(config.pipeline.chunk_max_length, 1500);
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/scrivener"));
    }

    #[test]
    fn test_invalid_pipeline_rejected() {
        let toml = r#"
            [pipeline]
            chunk_min_length = 2000
        "#;
        assert!(matches!(
            ScrivenerConfig::parse(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ScrivenerConfig::default();
        let rendered = config.to_toml().unwrap();
        assert_eq!(ScrivenerConfig::parse(&rendered).unwrap(), config);
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = ScrivenerConfig::default();
        config.llm.api_key_env = "SCRIVENER_TEST_UNSET_KEY_VARIABLE".to_string();
        assert!(matches!(
            config.api_key(),
            Err(ConfigError::MissingApiKey(name)) if name == "SCRIVENER_TEST_UNSET_KEY_VARIABLE"
        ));
    }
}
