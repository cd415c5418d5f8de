//! Content types for canonical messages.

use crate::error::RelayError;
use serde::{Deserialize, Serialize};

/// Message content: either a plain string or an ordered list of typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Ordered sequence of text and image parts
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Get the text if this is plain text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(_) => None,
        }
    }

    /// Concatenated text of all text-bearing content, ignoring images
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts.iter().filter_map(ContentPart::as_text).collect(),
        }
    }

    /// Number of image parts in this content
    pub fn image_count(&self) -> usize {
        match self {
            Self::Text(_) => 0,
            Self::Parts(parts) => parts.iter().filter(|part| part.is_image()).count(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}

/// A single typed part within multi-part content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text part
    Text { text: String },
    /// Image embedded as a data URL
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    /// Create a new text part
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a new image part from a data URL
    pub fn image<S: Into<String>>(url: S) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail: None,
            },
        }
    }

    /// Create a new image part with an explicit detail level (`low`, `high`, `auto`)
    pub fn image_with_detail<S: Into<String>>(url: S, detail: S) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail: Some(detail.into()),
            },
        }
    }

    /// Get the text if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::ImageUrl { .. } => None,
        }
    }

    /// Check if this is an image part
    pub fn is_image(&self) -> bool {
        matches!(self, Self::ImageUrl { .. })
    }
}

/// Image reference in the canonical (OpenAI-compatible) shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// `data:<media-type>;base64,<payload>` URL
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A data URL split into its media type and base64 payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub media_type: String,
    pub data: String,
}

impl DataUrl {
    /// Parse a `data:<media-type>;base64,<payload>` URL.
    ///
    /// The payload is everything after the first `,`. The header must start
    /// with `data:`, name a media type and end with the `;base64` marker.
    ///
    /// ```rust
    /// use llm_relay::types::DataUrl;
    ///
    /// let url = DataUrl::parse("data:image/png;base64,AAAA").unwrap();
    /// assert_eq!(url.media_type, "image/png");
    /// assert_eq!(url.data, "AAAA");
    /// ```
    pub fn parse(url: &str) -> Result<Self, RelayError> {
        let malformed = |reason: &str| {
            RelayError::malformed_input(format!(
                "image data URL {}: {}",
                reason,
                crate::utils::logging::truncate_string(url, 48)
            ))
        };

        let (header, data) = url
            .split_once(',')
            .ok_or_else(|| malformed("has no ',' before its payload"))?;
        let header = header
            .strip_prefix("data:")
            .ok_or_else(|| malformed("does not start with 'data:'"))?;
        let (params, encoding) = header
            .rsplit_once(';')
            .ok_or_else(|| malformed("is not base64 encoded"))?;
        if !encoding.eq_ignore_ascii_case("base64") {
            return Err(malformed("is not base64 encoded"));
        }

        let media_type = params.split(';').next().unwrap_or(params).trim();
        if media_type.is_empty() {
            return Err(malformed("has no media type"));
        }

        Ok(Self {
            media_type: media_type.to_string(),
            data: data.to_string(),
        })
    }

    /// Render back into a data URL
    pub fn to_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_png_data_url() {
        let parsed = DataUrl::parse("data:image/png;base64,AAAA").unwrap();
        assert_eq!(parsed.media_type, "image/png");
        assert_eq!(parsed.data, "AAAA");
        assert_eq!(parsed.to_url(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_parse_without_comma_fails() {
        let err = DataUrl::parse("data:image/png;base64AAAA").unwrap_err();
        assert!(matches!(err, RelayError::MalformedInput { .. }));
    }

    #[test]
    fn test_parse_without_colon_fails() {
        let err = DataUrl::parse("image/png;base64,AAAA").unwrap_err();
        assert!(matches!(err, RelayError::MalformedInput { .. }));
    }

    #[test]
    fn test_parse_rejects_non_data_urls() {
        let err = DataUrl::parse("https://example.com/img.png?size=1,2").unwrap_err();
        assert!(matches!(err, RelayError::MalformedInput { .. }));
    }

    #[test]
    fn test_parse_requires_base64_marker() {
        let err = DataUrl::parse("data:image/png,AAAA").unwrap_err();
        assert!(matches!(err, RelayError::MalformedInput { .. }));
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn test_parse_requires_media_type() {
        let err = DataUrl::parse("data:;base64,AAAA").unwrap_err();
        assert!(matches!(err, RelayError::MalformedInput { .. }));
    }

    #[test]
    fn test_parse_skips_extra_parameters() {
        let parsed = DataUrl::parse("data:image/svg+xml;charset=utf-8;base64,PHN2Zz4=").unwrap();
        assert_eq!(parsed.media_type, "image/svg+xml");
        assert_eq!(parsed.data, "PHN2Zz4=");
    }

    #[test]
    fn test_parse_keeps_full_payload() {
        let parsed = DataUrl::parse("data:image/jpeg;base64,/9j/4AAQ+abc==").unwrap();
        assert_eq!(parsed.media_type, "image/jpeg");
        assert_eq!(parsed.data, "/9j/4AAQ+abc==");
    }

    #[test]
    fn test_text_content_serializes_as_string() {
        let content = MessageContent::from("hello");
        assert_eq!(serde_json::to_value(&content).unwrap(), json!("hello"));
    }

    #[test]
    fn test_parts_serialize_in_openai_shape() {
        let content = MessageContent::Parts(vec![
            ContentPart::image_with_detail("data:image/png;base64,AAAA", "high"),
            ContentPart::text("Describe this"),
        ]);

        assert_eq!(
            serde_json::to_value(&content).unwrap(),
            json!([
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA", "detail": "high"}},
                {"type": "text", "text": "Describe this"}
            ])
        );
    }

    #[test]
    fn test_parts_deserialize_from_openai_shape() {
        let content: MessageContent = serde_json::from_value(json!([
            {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}},
            {"type": "text", "text": "Hi"}
        ]))
        .unwrap();

        assert_eq!(content.image_count(), 1);
        assert_eq!(content.text(), "Hi");
        assert!(content.as_text().is_none());
    }
}
