//! Response assembly
//!
//! Decides the final message shape from the builder's end state. Tool calls take
//! precedence over trailing text: a tool call terminates the assistant turn, so text is only
//! attached to it, never emitted instead of it.

use crate::types::{
    AggregatedResponse, AssistantMessage, FinishReason, ResponseMetadata, ToolExecutionRequest,
    Usage,
};

/// End state of an incremental builder, handed over exactly once.
#[derive(Debug, Clone, Default)]
pub struct AssemblyInput {
    pub text: String,
    pub thinking: String,
    /// Completed tool calls in completion order.
    pub tool_calls: Vec<ToolExecutionRequest>,
    /// Legacy single `function_call`, if one was streamed.
    pub legacy_call: Option<ToolExecutionRequest>,
    pub usage: Option<Usage>,
    pub finish_reason: Option<FinishReason>,
    pub metadata: ResponseMetadata,
    pub raw_events: Vec<String>,
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Pick the message shape:
/// 1. completed tool calls (+ text when non-blank)
/// 2. legacy `function_call` with a non-empty name (+ text when non-blank)
/// 3. non-blank text
/// 4. nothing
pub fn assemble_message(
    text: String,
    tool_calls: Vec<ToolExecutionRequest>,
    legacy_call: Option<ToolExecutionRequest>,
) -> Option<AssistantMessage> {
    let text = non_blank(text);

    if !tool_calls.is_empty() {
        return Some(AssistantMessage::with_tool_calls(text, tool_calls));
    }

    if let Some(call) = legacy_call.filter(|c| !c.name.is_empty()) {
        return Some(AssistantMessage::with_tool_calls(text, vec![call]));
    }

    text.map(AssistantMessage::text)
}

/// Build the aggregated response, or `None` when the stream produced no content.
pub fn assemble(input: AssemblyInput) -> Option<AggregatedResponse> {
    let AssemblyInput {
        text,
        thinking,
        tool_calls,
        legacy_call,
        usage,
        finish_reason,
        metadata,
        raw_events,
    } = input;

    let message = assemble_message(text, tool_calls, legacy_call)?;

    Some(AggregatedResponse {
        message,
        thinking: non_blank(thinking),
        usage,
        finish_reason,
        metadata,
        raw_events,
    })
}
