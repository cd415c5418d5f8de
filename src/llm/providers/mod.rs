//! Provider implementations.
//!
//! Each provider implements [`StreamingProvider`](crate::llm::traits::StreamingProvider)
//! over a transport trait, so the decode loop can run against fake transports.
//!
//! - `openai` - OpenAI chat completions over SSE
//! - `anthropic` - Anthropic Messages API over SSE
//! - `bedrock` - Claude on AWS Bedrock via `InvokeModelWithResponseStream`

pub mod anthropic;
pub mod bedrock;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use bedrock::BedrockProvider;
pub use openai::OpenAIProvider;
