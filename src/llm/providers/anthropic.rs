//! Anthropic Messages API provider implementation.
//!
//! The transport decodes the SSE event stream and yields text increments,
//! while keeping its own snapshot of the final message. When the stream ends
//! the provider returns that snapshot and checks it against what it forwarded.

use crate::error::RelayError;
use crate::llm::models::Llm;
use crate::llm::sse::{sse_events, SseEvent};
use crate::llm::streaming::{StreamAccumulator, TextSink};
use crate::llm::translate::to_claude_messages;
use crate::llm::traits::{
    clamp_tokens, ProviderRequest, ProviderType, StreamResponse, StreamingProvider, Usage,
};
use crate::types::{summarize_messages, Message};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;

/// Default Anthropic API root
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// API version header sent with every request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default output token ceiling
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Aggregate message assembled by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct FinalMessage {
    pub text: String,
    pub usage: Usage,
    pub stop_reason: Option<String>,
}

/// An open Messages API stream
#[async_trait]
pub trait MessagesStream: Send {
    /// Next text increment, or `None` once the message is complete
    async fn next_text(&mut self) -> Option<Result<String, RelayError>>;

    /// Final message snapshot; only meaningful after `next_text` returned `None`
    fn final_message(&self) -> Result<FinalMessage, RelayError>;
}

/// Opens a streaming Messages API request
#[async_trait]
pub trait MessagesTransport: Send + Sync + std::fmt::Debug {
    async fn open_stream(&self, body: &Value) -> Result<Box<dyn MessagesStream>, RelayError>;
}

/// Snapshot of a message being assembled from stream events
#[derive(Debug, Default)]
struct MessageSnapshot {
    started: bool,
    text: String,
    input_tokens: u32,
    output_tokens: u32,
    stop_reason: Option<String>,
}

impl MessageSnapshot {
    /// Apply one event, returning any text it carries
    fn apply(&mut self, event: &SseEvent) -> Result<EventOutcome, RelayError> {
        let payload: Value = serde_json::from_str(&event.data)?;
        let event_type = event
            .event
            .as_deref()
            .or_else(|| payload["type"].as_str())
            .unwrap_or("");

        match event_type {
            "message_start" => {
                self.started = true;
                let usage = &payload["message"]["usage"];
                self.input_tokens = clamp_tokens(usage["input_tokens"].as_u64().unwrap_or(0));
                self.output_tokens = clamp_tokens(usage["output_tokens"].as_u64().unwrap_or(0));
                tracing::debug!("🔵 message_start (input tokens: {})", self.input_tokens);
                Ok(EventOutcome::Continue)
            }
            "content_block_start" => {
                let initial = payload["content_block"]["text"].as_str().unwrap_or("");
                Ok(self.push_text(initial))
            }
            "content_block_delta" => {
                if payload["delta"]["type"] == "text_delta" {
                    let text = payload["delta"]["text"].as_str().unwrap_or("");
                    Ok(self.push_text(text))
                } else {
                    tracing::trace!("🔵 Ignoring non-text delta: {}", payload["delta"]["type"]);
                    Ok(EventOutcome::Continue)
                }
            }
            "message_delta" => {
                if let Some(reason) = payload["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(reason.to_string());
                }
                if let Some(output) = payload["usage"]["output_tokens"].as_u64() {
                    self.output_tokens = clamp_tokens(output);
                }
                Ok(EventOutcome::Continue)
            }
            "message_stop" => Ok(EventOutcome::Stop),
            "ping" | "content_block_stop" => Ok(EventOutcome::Continue),
            "error" => {
                let error = &payload["error"];
                Err(RelayError::transport_failure(
                    ProviderType::Anthropic,
                    format!(
                        "{}: {}",
                        error["type"].as_str().unwrap_or("error"),
                        error["message"].as_str().unwrap_or("unknown stream error")
                    ),
                ))
            }
            other => {
                tracing::trace!("🔵 Ignoring unknown event type '{}'", other);
                Ok(EventOutcome::Continue)
            }
        }
    }

    fn push_text(&mut self, text: &str) -> EventOutcome {
        if text.is_empty() {
            return EventOutcome::Continue;
        }
        self.text.push_str(text);
        EventOutcome::Text(text.to_string())
    }

    fn final_message(&self) -> Result<FinalMessage, RelayError> {
        if !self.started {
            return Err(RelayError::no_response(
                "Anthropic stream ended before message_start",
            ));
        }
        Ok(FinalMessage {
            text: self.text.clone(),
            usage: Usage::new(self.input_tokens, self.output_tokens),
            stop_reason: self.stop_reason.clone(),
        })
    }
}

#[derive(Debug, PartialEq)]
enum EventOutcome {
    Continue,
    Text(String),
    Stop,
}

/// Messages stream decoded from SSE events
pub struct SseMessagesStream<E> {
    events: BoxStream<'static, Result<SseEvent, E>>,
    snapshot: MessageSnapshot,
    finished: bool,
}

impl<E> SseMessagesStream<E> {
    pub fn new(events: BoxStream<'static, Result<SseEvent, E>>) -> Self {
        Self {
            events,
            snapshot: MessageSnapshot::default(),
            finished: false,
        }
    }
}

#[async_trait]
impl<E> MessagesStream for SseMessagesStream<E>
where
    E: std::fmt::Display + Send + 'static,
{
    async fn next_text(&mut self) -> Option<Result<String, RelayError>> {
        while !self.finished {
            let event = match self.events.next().await {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(RelayError::transport_failure(
                        ProviderType::Anthropic,
                        format!("stream read failed: {}", e),
                    )));
                }
                None => {
                    self.finished = true;
                    break;
                }
            };

            match self.snapshot.apply(&event) {
                Ok(EventOutcome::Continue) => continue,
                Ok(EventOutcome::Text(text)) => return Some(Ok(text)),
                Ok(EventOutcome::Stop) => self.finished = true,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }

    fn final_message(&self) -> Result<FinalMessage, RelayError> {
        self.snapshot.final_message()
    }
}

/// reqwest-backed transport for the Messages endpoint
#[derive(Debug, Clone)]
pub struct HttpMessagesTransport {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HttpMessagesTransport {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string());
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MessagesTransport for HttpMessagesTransport {
    async fn open_stream(&self, body: &Value) -> Result<Box<dyn MessagesStream>, RelayError> {
        tracing::debug!(
            "🔵 POST {}/v1/messages (key {})",
            self.base_url,
            crate::utils::logging::obscure_credential(&self.api_key)
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::http(ProviderType::Anthropic, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RelayError::transport_failure(
                ProviderType::Anthropic,
                format!("HTTP {}: {}", status, error_text),
            ));
        }

        let events = sse_events(response.bytes_stream()).boxed();
        Ok(Box::new(SseMessagesStream::new(events)))
    }
}

/// Anthropic native streaming provider
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    transport: Arc<dyn MessagesTransport>,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a provider talking to the Anthropic HTTP API
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self::with_transport(Arc::new(HttpMessagesTransport::new(api_key, base_url)))
    }

    /// Create a provider over an arbitrary transport
    pub fn with_transport(transport: Arc<dyn MessagesTransport>) -> Self {
        Self {
            transport,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl StreamingProvider for AnthropicProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Anthropic
    }

    fn translate(&self, model: Llm, messages: &[Message]) -> Result<ProviderRequest, RelayError> {
        if !model.is_claude() {
            return Err(RelayError::invalid_model(model.as_str()));
        }

        let (system, turns) = to_claude_messages(messages)?;
        tracing::debug!("🔵 Anthropic request messages:\n{}", summarize_messages(messages));

        Ok(ProviderRequest {
            provider: ProviderType::Anthropic,
            model_id: model.as_str().to_string(),
            body: json!({
                "model": model.as_str(),
                "max_tokens": self.max_tokens,
                "temperature": 0.0,
                "system": system,
                "messages": turns,
                "stream": true,
            }),
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        sink: &dyn TextSink,
    ) -> Result<StreamResponse, RelayError> {
        if request.provider != ProviderType::Anthropic {
            return Err(RelayError::malformed_input(format!(
                "request was translated for {}, not anthropic",
                request.provider
            )));
        }

        tracing::info!("🔵 Anthropic streaming request for model: {}", request.model_id);

        let mut stream = self.transport.open_stream(&request.body).await.map_err(|e| {
            tracing::error!("Anthropic stream failed to open: {}", e);
            e
        })?;

        let mut accumulator = StreamAccumulator::new();
        while let Some(text) = stream.next_text().await {
            let text = text.map_err(|e| {
                tracing::error!(
                    "Anthropic stream failed after {} increments: {}",
                    accumulator.increments(),
                    e
                );
                e
            })?;
            accumulator.forward(&text, sink).await;
        }

        let final_message = stream.final_message()?;
        if final_message.text != accumulator.as_str() {
            tracing::error!(
                "Anthropic final message ({} chars) differs from streamed text ({} chars)",
                final_message.text.len(),
                accumulator.as_str().len()
            );
            return Err(RelayError::StreamMismatch {
                provider: ProviderType::Anthropic,
            });
        }

        tracing::info!(
            "🔵 Anthropic stream finished: {} increments, tokens in/out {}/{}, stop reason {:?}",
            accumulator.increments(),
            final_message.usage.input_tokens,
            final_message.usage.output_tokens,
            final_message.stop_reason
        );

        Ok(StreamResponse {
            content: final_message.text,
            usage: Some(final_message.usage),
            increments: accumulator.increments(),
        })
    }
}
