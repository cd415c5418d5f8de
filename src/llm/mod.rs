//! Multi-provider LLM streaming with a unified interface.
//!
//! This module translates one canonical message list into the wire schema of
//! OpenAI, Anthropic or AWS Bedrock, streams the response, and forwards each
//! text increment to a caller-supplied [`TextSink`] as it arrives.
//!
//! # Quick Start
//!
//! ```no_run
//! use llm_relay::llm::models::Llm;
//! use llm_relay::llm::providers::AnthropicProvider;
//! use llm_relay::llm::streaming::StdoutSink;
//! use llm_relay::llm::traits::StreamingProvider;
//! use llm_relay::types::Message;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = AnthropicProvider::new(std::env::var("ANTHROPIC_API_KEY")?, None);
//!     let messages = vec![
//!         Message::system("You write single-file HTML apps."),
//!         Message::user("A counter with + and - buttons"),
//!     ];
//!
//!     let response = provider
//!         .stream_messages(Llm::Claude3Sonnet, &messages, &StdoutSink)
//!         .await?;
//!     println!("\n{} increments", response.increments);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Vec<Message> → StreamingProvider::translate → ProviderRequest
//!                                                   ↓
//!                 transport (reqwest SSE | aws-sdk-bedrockruntime)
//!                                                   ↓
//!                 decode loop → StreamAccumulator → TextSink
//! ```

pub mod models;
pub mod providers;
pub mod registry;
pub mod sse;
pub mod streaming;
pub mod translate;
pub mod traits;

pub use models::Llm;
pub use registry::{ProviderConfig, ProviderRegistry};
pub use streaming::{CollectingSink, FnSink, NullSink, StdoutSink, StreamAccumulator, TextSink};
pub use traits::{ProviderRequest, ProviderType, StreamResponse, StreamingProvider, Usage};
