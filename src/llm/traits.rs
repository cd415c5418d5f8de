//! Core traits for the provider abstraction layer.
//!
//! Every provider adapter implements [`StreamingProvider`]: it translates the
//! canonical message list into its own wire schema, then streams the response
//! through a [`TextSink`], returning the aggregate once the stream ends.

use crate::error::RelayError;
use crate::llm::models::Llm;
use crate::llm::streaming::TextSink;
use crate::types::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// LLM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// OpenAI chat completions REST API
    OpenAI,
    /// Anthropic Messages API
    Anthropic,
    /// Claude models hosted on AWS Bedrock
    Bedrock,
}

impl ProviderType {
    /// Get string representation of provider type
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Bedrock => "bedrock",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderType::OpenAI),
            "anthropic" => Ok(ProviderType::Anthropic),
            "bedrock" => Ok(ProviderType::Bedrock),
            other => Err(RelayError::configuration_error(format!(
                "Unknown provider '{}'. Use openai, anthropic or bedrock",
                other
            ))),
        }
    }
}

/// A translated, provider-specific request ready to stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Provider this request was built for
    pub provider: ProviderType,
    /// Provider-side model identifier
    pub model_id: String,
    /// JSON request body in the provider's wire schema
    pub body: serde_json::Value,
}

/// Token usage reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Create a new Usage with basic token counts
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    /// Build from JSON token counts, clamping anything past `u32::MAX`
    pub fn from_counts(input_tokens: u64, output_tokens: u64) -> Self {
        Self::new(clamp_tokens(input_tokens), clamp_tokens(output_tokens))
    }

    /// Sum two usages, saturating
    pub fn combine(self, other: Usage) -> Self {
        Self::new(
            self.input_tokens.saturating_add(other.input_tokens),
            self.output_tokens.saturating_add(other.output_tokens),
        )
    }
}

pub(crate) fn clamp_tokens(count: u64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Result of one streaming call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResponse {
    /// Final text; equals the concatenation of every increment sent to the sink
    pub content: String,
    /// Token usage, when the provider reports it
    pub usage: Option<Usage>,
    /// Number of sink invocations
    pub increments: usize,
}

/// Streaming capability shared by all provider adapters
#[async_trait]
pub trait StreamingProvider: Send + Sync + std::fmt::Debug {
    /// Provider type
    fn provider_type(&self) -> ProviderType;

    /// Translate canonical messages into this provider's request.
    ///
    /// Fails with `InvalidModel` or `MalformedInput` before any network activity.
    fn translate(&self, model: Llm, messages: &[Message]) -> Result<ProviderRequest, RelayError>;

    /// Issue the request and forward each text increment to `sink` in arrival order
    async fn stream(
        &self,
        request: ProviderRequest,
        sink: &dyn TextSink,
    ) -> Result<StreamResponse, RelayError>;

    /// Translate then stream
    async fn stream_messages(
        &self,
        model: Llm,
        messages: &[Message],
        sink: &dyn TextSink,
    ) -> Result<StreamResponse, RelayError> {
        let request = self.translate(model, messages)?;
        self.stream(request, sink).await
    }
}
