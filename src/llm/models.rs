//! Model identifiers.
//!
//! [`Llm`] is the closed set of model versions passed to providers and
//! recorded in logs. User-facing names are converted with
//! [`Llm::from_frontend_str`], which fails instead of passing unknown names
//! through.

use crate::error::RelayError;
use crate::llm::traits::ProviderType;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Known model versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Llm {
    #[serde(rename = "gpt-4-vision-preview")]
    Gpt4Vision,
    #[serde(rename = "gpt-4-turbo-2024-04-09")]
    Gpt4Turbo20240409,
    #[serde(rename = "claude-3-sonnet-20240229")]
    Claude3Sonnet,
    #[serde(rename = "claude-3-opus-20240229")]
    Claude3Opus,
    #[serde(rename = "claude-3-haiku-20240307")]
    Claude3Haiku,
}

impl Llm {
    /// Every known model
    pub const ALL: [Llm; 5] = [
        Llm::Gpt4Vision,
        Llm::Gpt4Turbo20240409,
        Llm::Claude3Sonnet,
        Llm::Claude3Opus,
        Llm::Claude3Haiku,
    ];

    /// Model identifier sent to the OpenAI and Anthropic APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Llm::Gpt4Vision => "gpt-4-vision-preview",
            Llm::Gpt4Turbo20240409 => "gpt-4-turbo-2024-04-09",
            Llm::Claude3Sonnet => "claude-3-sonnet-20240229",
            Llm::Claude3Opus => "claude-3-opus-20240229",
            Llm::Claude3Haiku => "claude-3-haiku-20240307",
        }
    }

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Llm::Gpt4Vision => "GPT-4 Vision",
            Llm::Gpt4Turbo20240409 => "GPT-4 Turbo (2024-04-09)",
            Llm::Claude3Sonnet => "Claude 3 Sonnet",
            Llm::Claude3Opus => "Claude 3 Opus",
            Llm::Claude3Haiku => "Claude 3 Haiku",
        }
    }

    /// Vendor family this model belongs to
    pub fn family(&self) -> ProviderType {
        match self {
            Llm::Gpt4Vision | Llm::Gpt4Turbo20240409 => ProviderType::OpenAI,
            Llm::Claude3Sonnet | Llm::Claude3Opus | Llm::Claude3Haiku => ProviderType::Anthropic,
        }
    }

    /// Check if the model is a Claude model (native API or Bedrock)
    pub fn is_claude(&self) -> bool {
        self.family() == ProviderType::Anthropic
    }

    /// Explicit `max_tokens` for the OpenAI request, only set for models that need it
    pub fn openai_max_tokens(&self) -> Option<u32> {
        match self {
            Llm::Gpt4Vision | Llm::Gpt4Turbo20240409 => Some(4096),
            _ => None,
        }
    }

    /// Bedrock model id for Claude models
    pub fn bedrock_model_id(&self) -> Option<&'static str> {
        match self {
            Llm::Claude3Sonnet => Some("anthropic.claude-3-sonnet-20240229-v1:0"),
            Llm::Claude3Opus => Some("anthropic.claude-3-opus-20240229-v1:0"),
            Llm::Claude3Haiku => Some("anthropic.claude-3-haiku-20240307-v1:0"),
            _ => None,
        }
    }

    /// Convert a user-facing model name.
    ///
    /// Two legacy short names are special-cased; anything else must equal a
    /// known model identifier exactly.
    ///
    /// ```rust
    /// use llm_relay::llm::models::Llm;
    ///
    /// assert_eq!(Llm::from_frontend_str("gpt_4_vision").unwrap(), Llm::Gpt4Vision);
    /// assert_eq!(Llm::from_frontend_str("claude-3-opus-20240229").unwrap(), Llm::Claude3Opus);
    /// assert!(Llm::from_frontend_str("gpt-5").is_err());
    /// ```
    pub fn from_frontend_str(name: &str) -> Result<Self, RelayError> {
        match name {
            "gpt_4_vision" => Ok(Llm::Gpt4Vision),
            "claude_3_sonnet" => Ok(Llm::Claude3Sonnet),
            other => other.parse(),
        }
    }
}

impl FromStr for Llm {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Llm::ALL
            .iter()
            .copied()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| RelayError::invalid_model(s))
    }
}

impl std::fmt::Display for Llm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontend_short_names() {
        assert_eq!(
            Llm::from_frontend_str("gpt_4_vision").unwrap().as_str(),
            "gpt-4-vision-preview"
        );
        assert_eq!(
            Llm::from_frontend_str("claude_3_sonnet").unwrap().as_str(),
            "claude-3-sonnet-20240229"
        );
    }

    #[test]
    fn test_exact_identifiers_parse() {
        for model in Llm::ALL {
            assert_eq!(Llm::from_frontend_str(model.as_str()).unwrap(), model);
        }
    }

    #[test]
    fn test_unknown_name_is_invalid_model() {
        let err = Llm::from_frontend_str("claude_3_opus").unwrap_err();
        match err {
            RelayError::InvalidModel { name } => assert_eq!(name, "claude_3_opus"),
            other => panic!("expected InvalidModel, got {:?}", other),
        }
    }

    #[test]
    fn test_openai_max_tokens_only_for_gpt4_models() {
        assert_eq!(Llm::Gpt4Vision.openai_max_tokens(), Some(4096));
        assert_eq!(Llm::Gpt4Turbo20240409.openai_max_tokens(), Some(4096));
        assert_eq!(Llm::Claude3Opus.openai_max_tokens(), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Llm::Claude3Sonnet.display_name(), "Claude 3 Sonnet");
        assert_eq!(Llm::Gpt4Vision.display_name(), "GPT-4 Vision");
    }

    #[test]
    fn test_bedrock_ids() {
        assert_eq!(
            Llm::Claude3Sonnet.bedrock_model_id(),
            Some("anthropic.claude-3-sonnet-20240229-v1:0")
        );
        assert_eq!(Llm::Gpt4Vision.bedrock_model_id(), None);
    }

    #[test]
    fn test_serde_uses_identifier() {
        let json = serde_json::to_string(&Llm::Claude3Haiku).unwrap();
        assert_eq!(json, "\"claude-3-haiku-20240307\"");
        let parsed: Llm = serde_json::from_str("\"gpt-4-turbo-2024-04-09\"").unwrap();
        assert_eq!(parsed, Llm::Gpt4Turbo20240409);
    }
}
