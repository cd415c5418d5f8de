//! OpenAI chat completions provider implementation.
//!
//! The canonical message shape is the chat-completions schema, so messages
//! are passed through untouched. Responses arrive as SSE `data:` lines, each
//! carrying one chat-completion chunk, terminated by `data: [DONE]`.

use crate::error::RelayError;
use crate::llm::models::Llm;
use crate::llm::sse::sse_events;
use crate::llm::streaming::{StreamAccumulator, TextSink};
use crate::llm::traits::{ProviderRequest, ProviderType, StreamResponse, StreamingProvider, Usage};
use crate::types::{summarize_messages, Message};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Default OpenAI API root
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default ceiling for a whole streaming request
pub const DEFAULT_OPENAI_TIMEOUT: Duration = Duration::from_secs(600);

/// One streamed chat-completion chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChunkUsage>,
    /// Set when the server aborts mid-stream with an error object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ChunkError>,
}

impl ChatCompletionChunk {
    /// Chunk with a single choice carrying `content`
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    content: Some(content.into()),
                },
            }],
            usage: None,
            error: None,
        }
    }
}

/// Error object carried by an aborted stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkError {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Usage block sent on the final chunk when the server includes it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

pub type ChunkStream = BoxStream<'static, Result<ChatCompletionChunk, RelayError>>;

/// Opens a streaming chat-completions request
#[async_trait]
pub trait ChatCompletionTransport: Send + Sync + std::fmt::Debug {
    async fn open_stream(&self, body: &Value) -> Result<ChunkStream, RelayError>;
}

/// reqwest-backed transport for the chat completions endpoint
#[derive(Debug, Clone)]
pub struct HttpChatCompletionTransport {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl HttpChatCompletionTransport {
    pub fn new(api_key: String, base_url: Option<String>, timeout: Duration) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl ChatCompletionTransport for HttpChatCompletionTransport {
    async fn open_stream(&self, body: &Value) -> Result<ChunkStream, RelayError> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(
            "🟢 POST {} (key {})",
            url,
            crate::utils::logging::obscure_credential(&self.api_key)
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::http(ProviderType::OpenAI, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RelayError::transport_failure(
                ProviderType::OpenAI,
                format!("HTTP {}: {}", status, error_text),
            ));
        }

        let mut events = Box::pin(sse_events(response.bytes_stream()));
        let chunks = async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if event.data.trim() == "[DONE]" {
                            tracing::debug!("🟢 Received [DONE] marker");
                            break;
                        }
                        match serde_json::from_str::<ChatCompletionChunk>(&event.data) {
                            Ok(chunk) => yield Ok(chunk),
                            Err(e) => {
                                yield Err(RelayError::from(e));
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(RelayError::http(ProviderType::OpenAI, e));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(chunks))
    }
}

/// OpenAI streaming provider
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    transport: Arc<dyn ChatCompletionTransport>,
}

impl OpenAIProvider {
    /// Create a provider talking to the OpenAI HTTP API
    pub fn new(api_key: String, base_url: Option<String>, timeout: Duration) -> Self {
        Self::with_transport(Arc::new(HttpChatCompletionTransport::new(
            api_key, base_url, timeout,
        )))
    }

    /// Create a provider over an arbitrary transport
    pub fn with_transport(transport: Arc<dyn ChatCompletionTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl StreamingProvider for OpenAIProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }

    fn translate(&self, model: Llm, messages: &[Message]) -> Result<ProviderRequest, RelayError> {
        if model.family() != ProviderType::OpenAI {
            return Err(RelayError::invalid_model(model.as_str()));
        }

        let mut body = json!({
            "model": model.as_str(),
            "messages": serde_json::to_value(messages)?,
            "stream": true,
            "temperature": 0.0,
        });
        if let Some(max_tokens) = model.openai_max_tokens() {
            body["max_tokens"] = json!(max_tokens);
        }

        tracing::debug!("🟢 OpenAI request messages:\n{}", summarize_messages(messages));

        Ok(ProviderRequest {
            provider: ProviderType::OpenAI,
            model_id: model.as_str().to_string(),
            body,
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        sink: &dyn TextSink,
    ) -> Result<StreamResponse, RelayError> {
        if request.provider != ProviderType::OpenAI {
            return Err(RelayError::malformed_input(format!(
                "request was translated for {}, not openai",
                request.provider
            )));
        }

        tracing::info!("🟢 OpenAI streaming request for model: {}", request.model_id);

        let mut chunks = self.transport.open_stream(&request.body).await.map_err(|e| {
            tracing::error!("OpenAI stream failed to open: {}", e);
            e
        })?;

        let mut accumulator = StreamAccumulator::new();
        let mut usage = None;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| {
                tracing::error!("OpenAI stream failed after {} increments: {}", accumulator.increments(), e);
                e
            })?;

            if let Some(error) = chunk.error {
                let kind = error.kind.as_deref().unwrap_or("error");
                tracing::error!(
                    "OpenAI stream aborted after {} increments: {} ({})",
                    accumulator.increments(),
                    error.message,
                    kind
                );
                return Err(RelayError::transport_failure(
                    ProviderType::OpenAI,
                    format!("{}: {}", kind, error.message),
                ));
            }

            if let Some(chunk_usage) = chunk.usage {
                usage = Some(Usage::new(chunk_usage.prompt_tokens, chunk_usage.completion_tokens));
            }

            let Some(choice) = chunk.choices.first() else {
                tracing::trace!("🟢 Skipping chunk without choices");
                continue;
            };
            let text = choice.delta.content.as_deref().unwrap_or("");
            accumulator.forward(text, sink).await;
        }

        let increments = accumulator.increments();
        let content = accumulator.into_string();
        tracing::info!(
            "🟢 OpenAI stream finished: {} increments, {} chars",
            increments,
            content.len()
        );

        Ok(StreamResponse {
            content,
            usage,
            increments,
        })
    }
}
