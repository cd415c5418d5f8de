//! Stream LLM output from OpenAI, Anthropic and AWS Bedrock through one interface.
//!
//! llm-relay takes a single canonical message list (role plus text or
//! text-and-image parts), translates it into each provider's wire schema, and
//! forwards generated text to your sink increment by increment as it arrives.
//! On top of that it runs a "draft, then refine" multi-pass protocol for
//! Claude models.
//!
//! # Quick Start
//!
//! ```no_run
//! use llm_relay::llm::models::Llm;
//! use llm_relay::llm::providers::OpenAIProvider;
//! use llm_relay::llm::streaming::FnSink;
//! use llm_relay::llm::traits::StreamingProvider;
//! use llm_relay::types::{ContentPart, Message};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OpenAIProvider::new(
//!         std::env::var("OPENAI_API_KEY")?,
//!         None,
//!         Duration::from_secs(600),
//!     );
//!
//!     let messages = vec![
//!         Message::system("You turn screenshots into HTML."),
//!         Message::user_parts(vec![
//!             ContentPart::image("data:image/png;base64,iVBORw0KGgo="),
//!             ContentPart::text("Build this page"),
//!         ]),
//!     ];
//!
//!     let sink = FnSink::new(|text: String| async move { print!("{}", text) });
//!     let model = Llm::from_frontend_str("gpt_4_vision")?;
//!     let response = provider.stream_messages(model, &messages, &sink).await?;
//!     println!("\n{} chars", response.content.len());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture Overview
//!
//! - **[`types`]** - canonical messages and content parts
//! - **[`llm`]** - model identifiers, the [`llm::traits::StreamingProvider`]
//!   trait, provider adapters, sinks and the provider registry
//! - **[`multipass`]** - the draft-then-refine orchestrator
//! - **[`debug`]** - optional capture of pass outputs to files
//! - **[`config`]** - file and environment configuration
//!
//! Every streaming call is a sequential producer/consumer loop: each sink
//! call is awaited before the next network chunk is read. Nothing is retried.

pub mod config;
pub mod debug;
pub mod error;
pub mod llm;
pub mod multipass;
pub mod types;
pub mod utils;

pub use error::RelayError;
pub use types::*;

pub type Result<T> = std::result::Result<T, RelayError>;
