//! AWS Bedrock provider implementation for Claude models.
//!
//! Requests go through `InvokeModelWithResponseStream`. Each response chunk is
//! a UTF-8 JSON event in the Claude streaming schema; only
//! `content_block_delta` events contribute text.

use crate::error::RelayError;
use crate::llm::models::Llm;
use crate::llm::streaming::{StreamAccumulator, TextSink};
use crate::llm::translate::to_claude_messages;
use crate::llm::traits::{ProviderRequest, ProviderType, StreamResponse, StreamingProvider, Usage};
use crate::types::{summarize_messages, Message};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::ResponseStream;
use aws_sdk_bedrockruntime::Client as BedrockRuntimeClient;
use futures::stream::{BoxStream, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;

/// Anthropic schema version Bedrock expects in the request body
pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Default output token ceiling
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

pub type ChunkByteStream = BoxStream<'static, Result<Vec<u8>, RelayError>>;

/// Invokes a Bedrock model with a streaming response
#[async_trait]
pub trait InvokeStreamTransport: Send + Sync + std::fmt::Debug {
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<ChunkByteStream, RelayError>;
}

/// Static AWS credentials
#[derive(Clone)]
pub struct StaticCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field(
                "access_key",
                &crate::utils::logging::obscure_credential(&self.access_key),
            )
            .field("secret_key", &"****")
            .finish()
    }
}

/// AWS SDK transport; a client is built per call from static credentials
#[derive(Debug, Clone)]
pub struct AwsBedrockTransport {
    credentials: StaticCredentials,
    region: Option<String>,
}

impl AwsBedrockTransport {
    pub fn new(credentials: StaticCredentials, region: Option<String>) -> Self {
        Self {
            credentials,
            region,
        }
    }

    async fn client(&self) -> BedrockRuntimeClient {
        let credentials = aws_credential_types::Credentials::new(
            self.credentials.access_key.clone(),
            self.credentials.secret_key.clone(),
            None,
            None,
            "llm-relay",
        );

        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials);
        if let Some(region) = &self.region {
            config_loader = config_loader.region(aws_config::Region::new(region.clone()));
        }

        let aws_config = config_loader.load().await;
        BedrockRuntimeClient::new(&aws_config)
    }
}

#[async_trait]
impl InvokeStreamTransport for AwsBedrockTransport {
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<ChunkByteStream, RelayError> {
        tracing::debug!(
            "🟠 Building Bedrock client (access key {}, region {:?})",
            crate::utils::logging::obscure_credential(&self.credentials.access_key),
            self.region
        );
        let client = self.client().await;

        let response = client
            .invoke_model_with_response_stream()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(RelayError::from)?;

        let mut receiver = response.body;
        let chunks = async_stream::stream! {
            let mut chunk_count = 0usize;
            loop {
                match receiver.recv().await {
                    Ok(Some(ResponseStream::Chunk(part))) => {
                        chunk_count += 1;
                        if let Some(bytes) = part.bytes() {
                            tracing::trace!("🟠 Bedrock chunk #{}: {} bytes", chunk_count, bytes.as_ref().len());
                            yield Ok(bytes.as_ref().to_vec());
                        }
                    }
                    Ok(Some(other)) => {
                        tracing::trace!("🟠 Ignoring Bedrock stream event: {:?}", other);
                    }
                    Ok(None) => {
                        tracing::debug!("🟠 Bedrock stream completed - {} chunks", chunk_count);
                        break;
                    }
                    Err(e) => {
                        yield Err(RelayError::transport_failure(
                            ProviderType::Bedrock,
                            format!("stream receive failed: {}", e),
                        ));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(chunks))
    }
}

/// Bedrock streaming provider
#[derive(Debug, Clone)]
pub struct BedrockProvider {
    transport: Arc<dyn InvokeStreamTransport>,
    max_tokens: u32,
}

impl BedrockProvider {
    /// Create a provider using the AWS SDK with static credentials
    pub fn new(access_key: String, secret_key: String, region: Option<String>) -> Self {
        Self::with_transport(Arc::new(AwsBedrockTransport::new(
            StaticCredentials {
                access_key,
                secret_key,
            },
            region,
        )))
    }

    /// Create a provider over an arbitrary transport
    pub fn with_transport(transport: Arc<dyn InvokeStreamTransport>) -> Self {
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

/// Usage from the trailing `amazon-bedrock-invocationMetrics` block
fn invocation_usage(event: &Value) -> Option<Usage> {
    let metrics = event.get("amazon-bedrock-invocationMetrics")?;
    Some(Usage::from_counts(
        metrics["inputTokenCount"].as_u64().unwrap_or(0),
        metrics["outputTokenCount"].as_u64().unwrap_or(0),
    ))
}

#[async_trait]
impl StreamingProvider for BedrockProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Bedrock
    }

    fn translate(&self, model: Llm, messages: &[Message]) -> Result<ProviderRequest, RelayError> {
        let model_id = model
            .bedrock_model_id()
            .ok_or_else(|| RelayError::invalid_model(model.as_str()))?;

        let (system, turns) = to_claude_messages(messages)?;
        tracing::debug!("🟠 Bedrock request messages:\n{}", summarize_messages(messages));

        Ok(ProviderRequest {
            provider: ProviderType::Bedrock,
            model_id: model_id.to_string(),
            body: json!({
                "anthropic_version": BEDROCK_ANTHROPIC_VERSION,
                "max_tokens": self.max_tokens,
                "system": system,
                "messages": turns,
                "temperature": 0.0,
            }),
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        sink: &dyn TextSink,
    ) -> Result<StreamResponse, RelayError> {
        if request.provider != ProviderType::Bedrock {
            return Err(RelayError::malformed_input(format!(
                "request was translated for {}, not bedrock",
                request.provider
            )));
        }

        tracing::info!("🟠 Bedrock streaming request for model: {}", request.model_id);
        let body = serde_json::to_vec(&request.body)?;

        let mut chunks = self
            .transport
            .invoke(&request.model_id, body)
            .await
            .map_err(|e| {
                tracing::error!("Bedrock invoke failed: {}", e);
                e
            })?;

        let mut accumulator = StreamAccumulator::new();
        let mut usage = None;

        while let Some(chunk) = chunks.next().await {
            let bytes = chunk.map_err(|e| {
                tracing::error!(
                    "Bedrock stream failed after {} increments: {}",
                    accumulator.increments(),
                    e
                );
                e
            })?;

            let text = std::str::from_utf8(&bytes).map_err(|e| {
                RelayError::serialization_error(format!("Bedrock chunk is not UTF-8: {}", e))
            })?;
            let event: Value = serde_json::from_str(text)?;

            if let Some(reported) = invocation_usage(&event) {
                usage = Some(reported);
            }

            match event["type"].as_str() {
                Some("content_block_delta") => {
                    if let Some(delta) = event["delta"]["text"].as_str() {
                        accumulator.forward(delta, sink).await;
                    }
                }
                other => tracing::trace!("🟠 Ignoring Bedrock event {:?}", other),
            }
        }

        let increments = accumulator.increments();
        let content = accumulator.into_string();
        match usage {
            Some(usage) => tracing::info!(
                "🟠 Bedrock stream finished: {} increments, tokens in/out {}/{}",
                increments,
                usage.input_tokens,
                usage.output_tokens
            ),
            None => tracing::info!("🟠 Bedrock stream finished: {} increments", increments),
        }

        Ok(StreamResponse {
            content,
            usage,
            increments,
        })
    }
}
