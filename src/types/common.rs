//! Common enums and metadata types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason why the model stopped generating tokens.
///
/// # Examples
///
/// ```rust
/// use siumai_openai_stream::types::FinishReason;
///
/// assert_eq!(FinishReason::from_chat_completion("tool_calls"), FinishReason::ToolCalls);
/// assert_eq!(FinishReason::from_response_status("incomplete", false), FinishReason::Length);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// Completed naturally or hit a stop sequence.
    ///
    /// Maps to:
    /// - Chat completions: `stop`
    /// - Responses: `completed` without tool calls
    Stop,

    /// Reached the maximum number of output tokens.
    ///
    /// Maps to:
    /// - Chat completions: `length`
    /// - Responses: `incomplete`
    Length,

    /// The turn ended with tool/function calls.
    ///
    /// Maps to:
    /// - Chat completions: `tool_calls`, `function_call`
    /// - Responses: `completed` with at least one function call
    ToolCalls,

    /// Content was filtered.
    ///
    /// Maps to:
    /// - Chat completions: `content_filter`
    /// - Responses: `incomplete` with reason `content_filter`
    ContentFilter,

    /// Generation failed on the provider side (Responses `failed`).
    Error,

    /// Other provider-specific finish reason.
    Other(String),
}

impl FinishReason {
    /// Map a chat-completions `finish_reason` token.
    pub fn from_chat_completion(raw: &str) -> Self {
        match raw {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            other => Self::Other(other.to_string()),
        }
    }

    /// Map a Responses API terminal `status`.
    ///
    /// `content_filter` is accepted as a pseudo-status for incomplete responses whose
    /// `incomplete_details.reason` names the content filter.
    pub fn from_response_status(status: &str, has_tool_calls: bool) -> Self {
        match status {
            "completed" if has_tool_calls => Self::ToolCalls,
            "completed" => Self::Stop,
            "incomplete" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "failed" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Response metadata accumulated over the stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Response ID (`chatcmpl-...` / `resp_...`)
    pub id: Option<String>,
    /// Model name reported by the provider
    pub model: Option<String>,
    /// Creation time
    pub created: Option<DateTime<Utc>>,
    /// Service tier the request ran on
    pub service_tier: Option<String>,
    /// Backend configuration fingerprint
    pub system_fingerprint: Option<String>,
    /// Provider name
    pub provider: String,
}
