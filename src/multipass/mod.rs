//! Draft-then-refine multi-pass orchestration.
//!
//! A run streams the conversation through a Claude provider `passes` times.
//! Between passes the previous output is appended as an assistant turn
//! (prefixed with the thinking marker) followed by a fixed request to improve
//! the draft. The last pass's text is the result.
//!
//! ```text
//! Streaming(1) → Done(1) → [append 2 turns] → Streaming(2) → Done(2) → ...
//! ```
//!
//! # Example
//!
//! ```no_run
//! use llm_relay::llm::models::Llm;
//! use llm_relay::llm::providers::AnthropicProvider;
//! use llm_relay::llm::streaming::StdoutSink;
//! use llm_relay::multipass::MultiPassOrchestrator;
//! use llm_relay::types::Message;
//! use std::sync::Arc;
//!
//! # async fn run() -> llm_relay::Result<()> {
//! let provider = Arc::new(AnthropicProvider::new("sk-ant-...".to_string(), None));
//! let orchestrator = MultiPassOrchestrator::new(provider, Llm::Claude3Opus);
//!
//! let mut conversation = vec![Message::user("Recreate the app in the video")];
//! let result = orchestrator
//!     .run("You are an expert web developer.", &mut conversation, &StdoutSink)
//!     .await?;
//! assert_eq!(result.passes.len(), 2);
//! # Ok(())
//! # }
//! ```

use crate::config::{DebugConfig, MultiPassConfig};
use crate::debug::{extract_html_content, thinking_section, DebugCapture, NoopDebugCapture};
use crate::error::RelayError;
use crate::llm::models::Llm;
use crate::llm::streaming::TextSink;
use crate::llm::traits::{ProviderType, StreamingProvider, Usage};
use crate::types::Message;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Marker prefixed to each prior pass when it is fed back
pub const THINKING_PREFIX: &str = "<thinking>";

/// User turn appended after every pass except the last
pub const REFINE_INSTRUCTION: &str = "You've done a good job with a first draft. Improve this further based on the original instructions so that the app is fully functional and looks like the original video of the app we're trying to replicate.";

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Streaming(u32),
    Done(u32),
}

/// Output of one pass
#[derive(Debug, Clone, PartialEq)]
pub struct PassRecord {
    /// 1-based pass number
    pub index: u32,
    pub content: String,
    pub usage: Option<Usage>,
}

/// Output of a whole run
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPassResult {
    /// Text of the last pass
    pub content: String,
    pub passes: Vec<PassRecord>,
    /// Every increment of every pass, concatenated
    pub full_stream: String,
}

impl MultiPassResult {
    /// Token usage summed over every pass that reported it
    pub fn total_usage(&self) -> Option<Usage> {
        self.passes
            .iter()
            .filter_map(|pass| pass.usage)
            .reduce(Usage::combine)
    }
}

/// Forwards increments to the caller's sink while recording the run's full stream
struct TeeSink<'a> {
    inner: &'a dyn TextSink,
    full_stream: Mutex<String>,
}

#[async_trait]
impl<'a> TextSink for TeeSink<'a> {
    async fn on_text(&self, text: &str) {
        if let Ok(mut full_stream) = self.full_stream.lock() {
            full_stream.push_str(text);
        }
        self.inner.on_text(text).await;
    }
}

/// Runs the draft-then-refine protocol over a Claude provider
#[derive(Debug, Clone)]
pub struct MultiPassOrchestrator {
    provider: Arc<dyn StreamingProvider>,
    model: Llm,
    config: MultiPassConfig,
    debug: DebugConfig,
    capture: Arc<dyn DebugCapture>,
}

impl MultiPassOrchestrator {
    /// Two passes, no thinking prefill, debug capture off
    pub fn new(provider: Arc<dyn StreamingProvider>, model: Llm) -> Self {
        Self {
            provider,
            model,
            config: MultiPassConfig::default(),
            debug: DebugConfig::default(),
            capture: Arc::new(NoopDebugCapture),
        }
    }

    pub fn with_config(mut self, config: MultiPassConfig) -> Self {
        self.config = config;
        self
    }

    /// Set debug settings and the capture that receives files when enabled
    pub fn with_debug(mut self, debug: DebugConfig, capture: Arc<dyn DebugCapture>) -> Self {
        self.debug = debug;
        self.capture = capture;
        self
    }

    pub fn config(&self) -> &MultiPassConfig {
        &self.config
    }

    /// Run every pass, mutating `conversation` between passes.
    ///
    /// `conversation` holds the turns after the system prompt; the system
    /// prompt is prepended to each outgoing request and never stored in it.
    pub async fn run(
        &self,
        system_prompt: &str,
        conversation: &mut Vec<Message>,
        sink: &dyn TextSink,
    ) -> Result<MultiPassResult, RelayError> {
        if self.config.passes == 0 {
            return Err(RelayError::configuration_error(
                "Multi-pass runs need at least 1 pass",
            ));
        }
        if self.provider.provider_type() == ProviderType::OpenAI {
            return Err(RelayError::configuration_error(
                "Multi-pass runs need a Claude provider (anthropic or bedrock)",
            ));
        }

        tracing::info!(
            "🔁 Starting {}-pass run on {} with {}",
            self.config.passes,
            self.provider.provider_type(),
            self.model
        );

        let tee = TeeSink {
            inner: sink,
            full_stream: Mutex::new(String::new()),
        };
        let mut passes: Vec<PassRecord> = Vec::with_capacity(self.config.passes as usize);

        for index in 1..=self.config.passes {
            let mut state = PassState::Streaming(index);
            tracing::debug!("🔁 {:?}", state);

            let request = self.outgoing_messages(system_prompt, conversation);
            let response = self
                .provider
                .stream_messages(self.model, &request, &tee)
                .await?;

            state = PassState::Done(index);
            match response.usage {
                Some(usage) => tracing::info!(
                    "🔁 {:?}: {} chars, tokens in/out {}/{}",
                    state,
                    response.content.len(),
                    usage.input_tokens,
                    usage.output_tokens
                ),
                None => tracing::info!("🔁 {:?}: {} chars", state, response.content.len()),
            }

            if self.debug.enabled {
                self.capture_file(
                    &format!("pass_{}.html", index),
                    &extract_html_content(&response.content),
                );
                self.capture_file(
                    &format!("thinking_pass_{}.txt", index),
                    thinking_section(&response.content),
                );
            }

            if index < self.config.passes {
                conversation.push(Message::assistant(format!(
                    "{}{}",
                    THINKING_PREFIX, response.content
                )));
                conversation.push(Message::user(REFINE_INSTRUCTION));
            }

            passes.push(PassRecord {
                index,
                content: response.content,
                usage: response.usage,
            });
        }

        let full_stream = tee.full_stream.into_inner().unwrap_or_default();
        if self.debug.enabled {
            self.capture_file("full_stream.txt", &full_stream);
        }

        let content = passes
            .last()
            .map(|pass| pass.content.clone())
            .ok_or_else(|| RelayError::no_response("No pass produced a response"))?;

        Ok(MultiPassResult {
            content,
            passes,
            full_stream,
        })
    }

    fn outgoing_messages(&self, system_prompt: &str, conversation: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(conversation.len() + 2);
        messages.push(Message::system(system_prompt));
        messages.extend_from_slice(conversation);
        if self.config.include_thinking {
            messages.push(Message::assistant(THINKING_PREFIX));
        }
        messages
    }

    fn capture_file(&self, filename: &str, content: &str) {
        if let Err(e) = self.capture.write(filename, content) {
            tracing::warn!("Debug capture of {} failed: {}", filename, e);
        }
    }
}
