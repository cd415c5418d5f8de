//! Canonical message types.

use serde::{Deserialize, Serialize};

use super::content::{ContentPart, MessageContent};

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions, context)
    System,
    /// Message from the user/human
    User,
    /// Message from the AI assistant
    Assistant,
}

impl MessageRole {
    /// Get string representation of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A single chat turn
///
/// Serializes to the OpenAI chat-completions message shape, which is the
/// canonical representation for this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Text or multi-part content
    pub content: MessageContent,
}

impl Message {
    /// Create a new system message with text content
    pub fn system<S: Into<String>>(text: S) -> Self {
        Self::new(MessageRole::System, MessageContent::Text(text.into()))
    }

    /// Create a new user message with text content
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(MessageRole::User, MessageContent::Text(text.into()))
    }

    /// Create a new assistant message with text content
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::new(MessageRole::Assistant, MessageContent::Text(text.into()))
    }

    /// Create a new user message made of ordered parts
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self::new(MessageRole::User, MessageContent::Parts(parts))
    }

    /// Create a new message with the specified role and content
    pub fn new(role: MessageRole, content: MessageContent) -> Self {
        Self { role, content }
    }

    /// Get the text content of this message, ignoring images
    pub fn text(&self) -> String {
        self.content.text()
    }

    /// Check if this message carries any image parts
    pub fn has_images(&self) -> bool {
        self.content.image_count() > 0
    }
}

/// One-line-per-message summary for debug logging
pub fn summarize_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            format!(
                "  Message {}: role={}, chars={}, images={}",
                i + 1,
                msg.role.as_str(),
                msg.text().chars().count(),
                msg.content.image_count()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
