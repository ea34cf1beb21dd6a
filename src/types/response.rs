//! Final aggregated response types.

use serde::{Deserialize, Serialize};

use super::{FinishReason, ResponseMetadata, ToolExecutionRequest, Usage};

/// The assistant message reconstructed from a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Assistant text, `None` when the turn carried no (non-blank) text.
    pub text: Option<String>,
    /// Tool calls in completion order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolExecutionRequest>,
}

impl AssistantMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Tool calls, with the text that preceded them when there was any.
    pub fn with_tool_calls(text: Option<String>, tool_calls: Vec<ToolExecutionRequest>) -> Self {
        Self { text, tool_calls }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn shape(&self) -> MessageShape {
        match (self.text.is_some(), self.has_tool_calls()) {
            (true, true) => MessageShape::TextAndToolCalls,
            (false, true) => MessageShape::ToolCalls,
            (true, false) => MessageShape::Text,
            (false, false) => MessageShape::Empty,
        }
    }
}

/// Which parts an [`AssistantMessage`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageShape {
    Text,
    ToolCalls,
    TextAndToolCalls,
    Empty,
}

/// The single final message + metadata object produced once a stream completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResponse {
    pub message: AssistantMessage,
    /// Reasoning/thinking text, when the provider streamed any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    pub usage: Option<Usage>,
    pub finish_reason: Option<FinishReason>,
    pub metadata: ResponseMetadata,
    /// Raw frames in arrival order, only populated when `capture_raw_events` is enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_events: Vec<String>,
}

impl AggregatedResponse {
    /// Text content, or an empty string for tool-call-only messages.
    pub fn content_text(&self) -> &str {
        self.message.text.as_deref().unwrap_or_default()
    }

    pub fn tool_calls(&self) -> &[ToolExecutionRequest] {
        &self.message.tool_calls
    }
}
