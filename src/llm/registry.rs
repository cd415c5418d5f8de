//! Provider registry for constructing and sharing provider instances.
//!
//! [`ProviderConfig`] selects a provider and carries its credentials.
//! [`ProviderRegistry`] holds one config per provider type and builds each
//! provider lazily on first use.

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::llm::providers::bedrock::StaticCredentials;
use crate::llm::providers::{AnthropicProvider, BedrockProvider, OpenAIProvider};
use crate::llm::traits::{ProviderType, StreamingProvider};
use crate::utils::logging::obscure_credential;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Configuration for each provider type
#[derive(Clone)]
pub enum ProviderConfig {
    /// OpenAI chat completions
    OpenAI {
        api_key: String,
        base_url: Option<String>,
        timeout: Duration,
    },
    /// Anthropic Messages API
    Anthropic {
        api_key: String,
        base_url: Option<String>,
        max_tokens: u32,
    },
    /// Claude on AWS Bedrock
    Bedrock {
        credentials: StaticCredentials,
        region: Option<String>,
        max_tokens: u32,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key,
                base_url,
                timeout,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &obscure_credential(api_key))
                .field("base_url", base_url)
                .field("timeout", timeout)
                .finish(),
            ProviderConfig::Anthropic {
                api_key,
                base_url,
                max_tokens,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &obscure_credential(api_key))
                .field("base_url", base_url)
                .field("max_tokens", max_tokens)
                .finish(),
            ProviderConfig::Bedrock {
                credentials,
                region,
                max_tokens,
            } => f
                .debug_struct("Bedrock")
                .field("credentials", credentials)
                .field("region", region)
                .field("max_tokens", max_tokens)
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// Provider type this config builds
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderConfig::OpenAI { .. } => ProviderType::OpenAI,
            ProviderConfig::Anthropic { .. } => ProviderType::Anthropic,
            ProviderConfig::Bedrock { .. } => ProviderType::Bedrock,
        }
    }

    /// Construct the provider adapter
    pub fn build(&self) -> Arc<dyn StreamingProvider> {
        tracing::debug!("🔧 Building provider from {:?}", self);
        match self {
            ProviderConfig::OpenAI {
                api_key,
                base_url,
                timeout,
            } => Arc::new(OpenAIProvider::new(api_key.clone(), base_url.clone(), *timeout)),
            ProviderConfig::Anthropic {
                api_key,
                base_url,
                max_tokens,
            } => Arc::new(
                AnthropicProvider::new(api_key.clone(), base_url.clone())
                    .with_max_tokens(*max_tokens),
            ),
            ProviderConfig::Bedrock {
                credentials,
                region,
                max_tokens,
            } => Arc::new(
                BedrockProvider::new(
                    credentials.access_key.clone(),
                    credentials.secret_key.clone(),
                    region.clone(),
                )
                .with_max_tokens(*max_tokens),
            ),
        }
    }
}

/// Registry that holds provider configurations and lazily builds providers
#[derive(Default)]
pub struct ProviderRegistry {
    configs: RwLock<HashMap<ProviderType, ProviderConfig>>,
    providers: RwLock<HashMap<ProviderType, Arc<dyn StreamingProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every provider whose credentials are present in `config`
    pub async fn from_config(config: &RelayConfig) -> Self {
        let registry = Self::new();
        for provider_type in [
            ProviderType::OpenAI,
            ProviderType::Anthropic,
            ProviderType::Bedrock,
        ] {
            match config.provider_config(provider_type) {
                Ok(provider_config) => registry.add_config(provider_config).await,
                Err(e) => tracing::debug!("Provider {} not configured: {}", provider_type, e),
            }
        }
        registry
    }

    /// Add or replace a provider configuration, evicting any cached instance
    pub async fn add_config(&self, config: ProviderConfig) {
        let provider_type = config.provider_type();
        self.configs.write().await.insert(provider_type, config);
        self.providers.write().await.remove(&provider_type);
    }

    /// Get a provider, building it on first use
    pub async fn get_provider(
        &self,
        provider_type: ProviderType,
    ) -> Result<Arc<dyn StreamingProvider>, RelayError> {
        if let Some(provider) = self.providers.read().await.get(&provider_type) {
            return Ok(provider.clone());
        }

        let config = self
            .configs
            .read()
            .await
            .get(&provider_type)
            .cloned()
            .ok_or_else(|| {
                RelayError::configuration_error(format!(
                    "Provider {} is not configured",
                    provider_type
                ))
            })?;

        let provider = config.build();
        self.providers
            .write()
            .await
            .insert(provider_type, provider.clone());
        tracing::info!("🔧 Provider {} ready", provider_type);
        Ok(provider)
    }

    pub async fn is_configured(&self, provider_type: ProviderType) -> bool {
        self.configs.read().await.contains_key(&provider_type)
    }

    /// Configured provider types, in a stable order
    pub async fn configured_providers(&self) -> Vec<ProviderType> {
        let configs = self.configs.read().await;
        let mut providers: Vec<ProviderType> = configs.keys().copied().collect();
        providers.sort_by_key(|provider| provider.as_str());
        providers
    }

    /// Drop all cached provider instances
    pub async fn clear_cache(&self) {
        self.providers.write().await.clear();
    }
}
