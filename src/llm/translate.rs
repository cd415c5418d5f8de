//! Translation from canonical messages into the Claude Messages schema.
//!
//! Shared by the native Anthropic adapter and the Bedrock adapter, which
//! accept the same `system` + `messages` shape.

use crate::error::RelayError;
use crate::types::{ContentPart, DataUrl, Message, MessageContent, MessageRole};
use serde_json::{json, Value};

/// Split the leading system message off and translate the remaining turns.
///
/// The first message must be a system message with plain text content.
/// A system message anywhere later is rejected.
pub fn to_claude_messages(messages: &[Message]) -> Result<(String, Vec<Value>), RelayError> {
    let (first, rest) = messages
        .split_first()
        .ok_or_else(|| RelayError::malformed_input("message list is empty"))?;

    if first.role != MessageRole::System {
        return Err(RelayError::malformed_input(format!(
            "first message must be a system message, found {}",
            first.role.as_str()
        )));
    }
    let system = first
        .content
        .as_text()
        .ok_or_else(|| RelayError::malformed_input("system message must be plain text"))?
        .to_string();

    let mut translated = Vec::with_capacity(rest.len());
    for (index, message) in rest.iter().enumerate() {
        if message.role == MessageRole::System {
            return Err(RelayError::malformed_input(format!(
                "system message at position {} is not allowed after the first message",
                index + 1
            )));
        }
        translated.push(json!({
            "role": message.role.as_str(),
            "content": content_to_claude(&message.content)?,
        }));
    }

    tracing::debug!(
        "Translated {} turns for Claude (system prompt: {} chars)",
        translated.len(),
        system.len()
    );

    Ok((system, translated))
}

fn content_to_claude(content: &MessageContent) -> Result<Value, RelayError> {
    match content {
        MessageContent::Text(text) => Ok(Value::String(text.clone())),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(part_to_claude)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
    }
}

fn part_to_claude(part: &ContentPart) -> Result<Value, RelayError> {
    match part {
        ContentPart::Text { text } => Ok(json!({ "type": "text", "text": text })),
        ContentPart::ImageUrl { image_url } => {
            let DataUrl { media_type, data } = DataUrl::parse(&image_url.url)?;
            Ok(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": media_type,
                    "data": data,
                }
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_is_split_and_not_resent() {
        let messages = vec![
            Message::system("Be terse"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("again"),
        ];

        let (system, turns) = to_claude_messages(&messages).unwrap();

        assert_eq!(system, "Be terse");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0], json!({"role": "user", "content": "hi"}));
        assert_eq!(turns[1]["role"], "assistant");
        assert!(turns.iter().all(|turn| turn["role"] != "system"));
    }

    #[test]
    fn test_image_parts_become_base64_sources() {
        let messages = vec![
            Message::system("sys"),
            Message::user_parts(vec![
                ContentPart::image("data:image/png;base64,AAAA"),
                ContentPart::text("Build this"),
            ]),
        ];

        let (_, turns) = to_claude_messages(&messages).unwrap();

        assert_eq!(
            turns[0]["content"],
            json!([
                {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "AAAA"}},
                {"type": "text", "text": "Build this"}
            ])
        );
    }

    #[test]
    fn test_missing_system_message_rejected() {
        let err = to_claude_messages(&[Message::user("hi")]).unwrap_err();
        assert!(matches!(err, RelayError::MalformedInput { .. }));

        let err = to_claude_messages(&[]).unwrap_err();
        assert!(matches!(err, RelayError::MalformedInput { .. }));
    }

    #[test]
    fn test_system_with_parts_rejected() {
        let messages = vec![Message::new(
            MessageRole::System,
            MessageContent::Parts(vec![ContentPart::text("sys")]),
        )];
        assert!(to_claude_messages(&messages).is_err());
    }

    #[test]
    fn test_late_system_message_rejected() {
        let messages = vec![
            Message::system("sys"),
            Message::user("hi"),
            Message::system("again"),
        ];
        let err = to_claude_messages(&messages).unwrap_err();
        assert!(err.to_string().contains("position 2"));
    }

    #[test]
    fn test_bad_data_url_rejected() {
        let messages = vec![
            Message::system("sys"),
            Message::user_parts(vec![ContentPart::image("data:image/png;base64AAAA")]),
        ];
        let err = to_claude_messages(&messages).unwrap_err();
        assert!(matches!(err, RelayError::MalformedInput { .. }));
    }
}
