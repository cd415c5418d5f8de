//! Error handling for llm-relay
//!
//! Every failure surfaces to the immediate caller: nothing in this crate
//! retries or swallows an error. Text already delivered to a sink before a
//! failure stays with the caller.
//!
//! # Error Categories
//!
//! - **Input** - unknown model names and malformed messages, raised before any
//!   network activity
//! - **Transport** - HTTP, SSE and AWS SDK failures while a stream is open
//! - **Protocol** - the multi-pass run produced nothing, or a provider's final
//!   message disagrees with its streamed increments
//! - **Configuration** - missing credentials, invalid pass counts
//!
//! # Example
//!
//! ```rust
//! use llm_relay::error::RelayError;
//! use llm_relay::llm::models::Llm;
//!
//! let err = Llm::from_frontend_str("gpt_5_imaginary").unwrap_err();
//! assert!(matches!(err, RelayError::InvalidModel { .. }));
//! assert!(err.is_user_error());
//! ```

use crate::llm::traits::ProviderType;
use aws_sdk_bedrockruntime::error::SdkError;
use aws_sdk_bedrockruntime::operation::invoke_model_with_response_stream::InvokeModelWithResponseStreamError;
use thiserror::Error;

/// Main error type for llm-relay
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    /// Model name matches no known model identifier
    #[error("Invalid model: {name}")]
    InvalidModel { name: String },

    /// Message list or content part cannot be translated
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    /// The provider transport reported a failure
    #[error("Transport failure ({provider}): {message}")]
    TransportFailure {
        provider: ProviderType,
        message: String,
    },

    /// A multi-pass run finished without any usable response
    #[error("No response: {message}")]
    NoResponse { message: String },

    /// Provider final message differs from the concatenated increments
    #[error("Stream mismatch ({provider}): final message does not match streamed text")]
    StreamMismatch { provider: ProviderType },

    /// Chunk or request (de)serialization failed
    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    /// Configuration errors (credentials, pass count, etc.)
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

impl RelayError {
    /// Create an InvalidModel error
    pub fn invalid_model(name: impl Into<String>) -> Self {
        Self::InvalidModel { name: name.into() }
    }

    /// Create a MalformedInput error
    pub fn malformed_input(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    /// Create a TransportFailure error
    pub fn transport_failure(provider: ProviderType, message: impl Into<String>) -> Self {
        Self::TransportFailure {
            provider,
            message: message.into(),
        }
    }

    /// Create a NoResponse error
    pub fn no_response(message: impl Into<String>) -> Self {
        Self::NoResponse {
            message: message.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a ConfigurationError
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Wrap a reqwest failure for the given HTTP provider
    pub fn http(provider: ProviderType, error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            "timeout"
        } else if error.is_connect() {
            "connection failed"
        } else if error.is_decode() {
            "decode failed"
        } else {
            "request failed"
        };
        Self::transport_failure(provider, format!("HTTP {}: {}", kind, error))
    }

    /// Check if this error is due to caller-supplied input
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RelayError::InvalidModel { .. } | RelayError::MalformedInput { .. }
        )
    }

    /// Check if this error came from the provider transport
    pub fn is_transport_error(&self) -> bool {
        matches!(self, RelayError::TransportFailure { .. })
    }

    /// Provider associated with this error, if any
    pub fn provider(&self) -> Option<ProviderType> {
        match self {
            RelayError::TransportFailure { provider, .. }
            | RelayError::StreamMismatch { provider } => Some(*provider),
            _ => None,
        }
    }
}

/// Map JSON serialization errors to RelayError
impl From<serde_json::Error> for RelayError {
    fn from(error: serde_json::Error) -> Self {
        RelayError::serialization_error(format!("JSON serialization failed: {}", error))
    }
}

/// Classify Bedrock streaming API errors into a descriptive transport failure
impl From<SdkError<InvokeModelWithResponseStreamError>> for RelayError {
    fn from(sdk_error: SdkError<InvokeModelWithResponseStreamError>) -> Self {
        let message = match &sdk_error {
            SdkError::ServiceError(context) => {
                let service_error = context.err();
                let error_type = match service_error {
                    InvokeModelWithResponseStreamError::AccessDeniedException(_) => {
                        "AccessDeniedException"
                    }
                    InvokeModelWithResponseStreamError::ValidationException(_) => {
                        "ValidationException"
                    }
                    InvokeModelWithResponseStreamError::ResourceNotFoundException(_) => {
                        "ResourceNotFoundException"
                    }
                    InvokeModelWithResponseStreamError::ThrottlingException(_) => {
                        "ThrottlingException"
                    }
                    InvokeModelWithResponseStreamError::ServiceUnavailableException(_) => {
                        "ServiceUnavailableException"
                    }
                    InvokeModelWithResponseStreamError::ModelNotReadyException(_) => {
                        "ModelNotReadyException"
                    }
                    InvokeModelWithResponseStreamError::ModelTimeoutException(_) => {
                        "ModelTimeoutException"
                    }
                    InvokeModelWithResponseStreamError::InternalServerException(_) => {
                        "InternalServerException"
                    }
                    _ => "UnknownServiceError",
                };

                let error_message = match service_error {
                    InvokeModelWithResponseStreamError::AccessDeniedException(e) => e.message(),
                    InvokeModelWithResponseStreamError::ValidationException(e) => e.message(),
                    InvokeModelWithResponseStreamError::ResourceNotFoundException(e) => e.message(),
                    InvokeModelWithResponseStreamError::ThrottlingException(e) => e.message(),
                    InvokeModelWithResponseStreamError::ServiceUnavailableException(e) => {
                        e.message()
                    }
                    InvokeModelWithResponseStreamError::ModelNotReadyException(e) => e.message(),
                    InvokeModelWithResponseStreamError::ModelTimeoutException(e) => e.message(),
                    InvokeModelWithResponseStreamError::InternalServerException(e) => e.message(),
                    _ => None,
                };

                match error_message {
                    Some(message) => format!("{}: {}", error_type, message),
                    None => {
                        let service_error_str = service_error.to_string();
                        if service_error_str.contains("UnrecognizedClientException") {
                            "UnrecognizedClientException: Invalid or expired AWS credentials"
                                .to_string()
                        } else if service_error_str.contains("SignatureDoesNotMatch") {
                            "SignatureDoesNotMatch: AWS credential signature invalid".to_string()
                        } else {
                            format!("{}: {}", error_type, service_error_str)
                        }
                    }
                }
            }
            SdkError::ConstructionFailure(e) => format!("ConstructionFailure: {:?}", e),
            SdkError::DispatchFailure(e) => format!("DispatchFailure: {:?}", e),
            SdkError::ResponseError(e) => format!("ResponseError: {:?}", e),
            SdkError::TimeoutError(e) => format!("TimeoutError: {:?}", e),
            _ => format!("Unknown SDK error: {}", sdk_error),
        };

        RelayError::transport_failure(ProviderType::Bedrock, message)
    }
}

impl From<crate::config::ConfigError> for RelayError {
    fn from(error: crate::config::ConfigError) -> Self {
        RelayError::configuration_error(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = RelayError::invalid_model("gpt-9");
        assert!(matches!(error, RelayError::InvalidModel { .. }));
        assert_eq!(error.to_string(), "Invalid model: gpt-9");
    }

    #[test]
    fn test_error_classification() {
        let malformed = RelayError::malformed_input("bad data url");
        assert!(malformed.is_user_error());
        assert!(!malformed.is_transport_error());

        let transport = RelayError::transport_failure(ProviderType::Bedrock, "throttled");
        assert!(!transport.is_user_error());
        assert!(transport.is_transport_error());
        assert_eq!(transport.provider(), Some(ProviderType::Bedrock));

        let no_response = RelayError::no_response("nothing");
        assert!(!no_response.is_user_error());
        assert_eq!(no_response.provider(), None);
    }

    #[test]
    fn test_transport_failure_display_names_provider() {
        let error = RelayError::transport_failure(ProviderType::OpenAI, "HTTP 401");
        assert_eq!(error.to_string(), "Transport failure (openai): HTTP 401");
    }

    #[test]
    fn test_serialization_error_from_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: RelayError = json_error.into();

        assert!(matches!(error, RelayError::SerializationError { .. }));
        assert!(error.to_string().contains("JSON serialization failed"));
    }

    #[test]
    fn test_stream_mismatch_display() {
        let error = RelayError::StreamMismatch {
            provider: ProviderType::Anthropic,
        };
        assert!(error.to_string().contains("anthropic"));
    }
}
