//! Core error types.

use thiserror::Error;

/// Coarse classification of an [`LlmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network or transport failure.
    Network,
    /// The request was rejected by the provider (4xx).
    Client,
    /// The provider failed (5xx, stream-level provider errors).
    Server,
    /// Payload could not be parsed.
    Parsing,
    /// Invalid local configuration.
    Configuration,
    /// Failure raised by caller-supplied code (handlers).
    Handler,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// Anything else.
    Unknown,
}

/// Errors surfaced by the streaming core and its transport glue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Connection/transport failure.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Provider returned an error, either as an HTTP status or as an in-stream error event.
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// The SSE transport failed mid-stream.
    #[error("Stream error: {0}")]
    StreamError(String),

    /// A payload had an unexpected shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A payload was not valid JSON.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Request or stream timed out in the transport.
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The stream was cancelled by the caller.
    #[error("Stream cancelled")]
    Cancelled,

    /// A completion handler reported a failure.
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// Invariant violation inside the library.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl LlmError {
    /// Create an API error without details.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a handler error.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::HandlerError(message.into())
    }

    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::StreamError(_) | Self::TimeoutError(_) => {
                ErrorCategory::Network
            }
            Self::ApiError { code, .. } if (400..500).contains(code) => ErrorCategory::Client,
            Self::ApiError { .. } => ErrorCategory::Server,
            Self::ParseError(_) | Self::JsonError(_) => ErrorCategory::Parsing,
            Self::ConfigurationError(_) => ErrorCategory::Configuration,
            Self::HandlerError(_) => ErrorCategory::Handler,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::InternalError(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether a caller-side retry policy may reasonably retry the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(_) | Self::StreamError(_) | Self::TimeoutError(_) => true,
            Self::ApiError { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}
