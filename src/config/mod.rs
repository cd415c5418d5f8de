//! Configuration Management
//!
//! This module loads relay configuration from files (TOML, YAML, JSON) and
//! environment variables, validates it, and turns provider sections into
//! [`ProviderConfig`] values for the registry.
//!
//! Credentials can be read from files or the environment but are never
//! serialized back out.

use crate::llm::providers::anthropic::DEFAULT_ANTHROPIC_BASE_URL;
use crate::llm::providers::bedrock::StaticCredentials;
use crate::llm::providers::openai::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_TIMEOUT};
use crate::llm::registry::ProviderConfig;
use crate::llm::traits::ProviderType;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable parsing error: {0}")]
    EnvVarParse(String),
    #[error("File parsing error: {0}")]
    FileParse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main configuration structure for llm-relay
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub openai: OpenAIConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub bedrock: BedrockConfig,
    /// Draft-then-refine settings
    #[serde(default)]
    pub multipass: MultiPassConfig,
    /// Debug capture settings
    #[serde(default)]
    pub debug: DebugConfig,
}

/// OpenAI chat completions configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Ceiling for a whole streaming request
    #[serde(with = "duration_seconds", default = "default_openai_timeout")]
    pub timeout: Duration,
}

/// Anthropic Messages API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// AWS Bedrock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedrockConfig {
    #[serde(default, skip_serializing)]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub secret_key: Option<String>,
    /// AWS region; the SDK default chain applies when unset
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Multi-pass orchestration settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiPassConfig {
    /// Number of passes, at least 1
    #[serde(default = "default_passes")]
    pub passes: u32,
    /// Prefill each outgoing request with an assistant `<thinking>` turn
    #[serde(default)]
    pub include_thinking: bool,
}

/// Debug capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Root directory; each run writes into its own subdirectory
    #[serde(default = "default_debug_directory")]
    pub directory: PathBuf,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            timeout: default_openai_timeout(),
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_anthropic_base_url(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            region: None,
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for MultiPassConfig {
    fn default() -> Self {
        Self {
            passes: default_passes(),
            include_thinking: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_debug_directory(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a file (supports TOML, YAML, JSON)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let extension = path.extension().and_then(|s| s.to_str());

        match extension {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            _ => Err(ConfigError::FileParse(
                "Unsupported file format. Use .toml, .yaml, .yml, or .json".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Provider credentials
        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            config.openai.api_key = Some(api_key);
        }
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            config.openai.base_url = base_url;
        }
        if let Ok(api_key) = env::var("ANTHROPIC_API_KEY") {
            config.anthropic.api_key = Some(api_key);
        }
        if let Ok(access_key) = env::var("AWS_ACCESS_KEY_ID") {
            config.bedrock.access_key = Some(access_key);
        }
        if let Ok(secret_key) = env::var("AWS_SECRET_ACCESS_KEY") {
            config.bedrock.secret_key = Some(secret_key);
        }
        if let Ok(region) = env::var("AWS_REGION") {
            config.bedrock.region = Some(region);
        }

        // Multi-pass
        if let Ok(passes) = env::var("LLM_RELAY_PASSES") {
            config.multipass.passes = passes.parse().map_err(|_| {
                ConfigError::EnvVarParse(format!("Invalid LLM_RELAY_PASSES: {}", passes))
            })?;
        }
        if let Ok(include_thinking) = env::var("LLM_RELAY_INCLUDE_THINKING") {
            config.multipass.include_thinking =
                parse_flag("LLM_RELAY_INCLUDE_THINKING", &include_thinking)?;
        }

        // Debug capture
        if let Ok(enabled) = env::var("IS_DEBUG_ENABLED") {
            config.debug.enabled = parse_flag("IS_DEBUG_ENABLED", &enabled)?;
        }
        if let Ok(directory) = env::var("DEBUG_DIR") {
            config.debug.directory = PathBuf::from(directory);
        }

        Ok(config)
    }

    /// Merge configuration with environment variable overrides
    pub fn merge_with_env(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        // Environment takes precedence over file values
        if env_config.openai.api_key.is_some() {
            self.openai.api_key = env_config.openai.api_key;
        }
        if env::var("OPENAI_BASE_URL").is_ok() {
            self.openai.base_url = env_config.openai.base_url;
        }
        if env_config.anthropic.api_key.is_some() {
            self.anthropic.api_key = env_config.anthropic.api_key;
        }
        if env_config.bedrock.access_key.is_some() {
            self.bedrock.access_key = env_config.bedrock.access_key;
        }
        if env_config.bedrock.secret_key.is_some() {
            self.bedrock.secret_key = env_config.bedrock.secret_key;
        }
        if env_config.bedrock.region.is_some() {
            self.bedrock.region = env_config.bedrock.region;
        }
        if env::var("LLM_RELAY_PASSES").is_ok() {
            self.multipass.passes = env_config.multipass.passes;
        }
        if env::var("LLM_RELAY_INCLUDE_THINKING").is_ok() {
            self.multipass.include_thinking = env_config.multipass.include_thinking;
        }
        if env::var("IS_DEBUG_ENABLED").is_ok() {
            self.debug.enabled = env_config.debug.enabled;
        }
        if env::var("DEBUG_DIR").is_ok() {
            self.debug.directory = env_config.debug.directory;
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.openai.base_url.is_empty() || self.anthropic.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "Provider base URLs cannot be empty".to_string(),
            ));
        }
        if self.openai.timeout.as_secs() == 0 {
            return Err(ConfigError::Validation(
                "OpenAI timeout must be greater than 0".to_string(),
            ));
        }
        if self.anthropic.max_tokens == 0 || self.bedrock.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "Max tokens must be greater than 0".to_string(),
            ));
        }
        if self.multipass.passes == 0 {
            return Err(ConfigError::Validation(
                "Multi-pass runs need at least 1 pass".to_string(),
            ));
        }
        if self.debug.enabled && self.debug.directory.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "Debug directory required when debug capture is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the registry configuration for one provider
    pub fn provider_config(&self, provider: ProviderType) -> Result<ProviderConfig, ConfigError> {
        match provider {
            ProviderType::OpenAI => {
                let api_key = require(&self.openai.api_key, "OpenAI API key (OPENAI_API_KEY)")?;
                Ok(ProviderConfig::OpenAI {
                    api_key,
                    base_url: Some(self.openai.base_url.clone()),
                    timeout: self.openai.timeout,
                })
            }
            ProviderType::Anthropic => {
                let api_key = require(
                    &self.anthropic.api_key,
                    "Anthropic API key (ANTHROPIC_API_KEY)",
                )?;
                Ok(ProviderConfig::Anthropic {
                    api_key,
                    base_url: Some(self.anthropic.base_url.clone()),
                    max_tokens: self.anthropic.max_tokens,
                })
            }
            ProviderType::Bedrock => {
                let access_key = require(
                    &self.bedrock.access_key,
                    "AWS access key (AWS_ACCESS_KEY_ID)",
                )?;
                let secret_key = require(
                    &self.bedrock.secret_key,
                    "AWS secret key (AWS_SECRET_ACCESS_KEY)",
                )?;
                Ok(ProviderConfig::Bedrock {
                    credentials: StaticCredentials {
                        access_key,
                        secret_key,
                    },
                    region: self.bedrock.region.clone(),
                    max_tokens: self.bedrock.max_tokens,
                })
            }
        }
    }
}

fn require(value: &Option<String>, what: &str) -> Result<String, ConfigError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(ConfigError::Validation(format!("Missing {}", what))),
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::EnvVarParse(format!(
            "Invalid {}: {}",
            name, value
        ))),
    }
}

/// Custom serialization for Duration as seconds
mod duration_seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Default value functions for serde
fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_openai_timeout() -> Duration {
    DEFAULT_OPENAI_TIMEOUT
}

fn default_anthropic_base_url() -> String {
    DEFAULT_ANTHROPIC_BASE_URL.to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_passes() -> u32 {
    2
}

fn default_debug_directory() -> PathBuf {
    PathBuf::from("./debug")
}
