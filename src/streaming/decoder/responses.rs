//! Responses API event decoder.

use std::sync::Arc;

use serde::Deserialize;

use super::{DecoderCore, EventDecoder, timestamp};
use crate::config::StreamConfig;
use crate::error::LlmError;
use crate::streaming::builder::{IncrementalResponseBuilder, StreamProtocol};
use crate::streaming::delta::{MetadataFragment, PartialDelta, ToolCallFragment};
use crate::streaming::handler::CompletionHandler;
use crate::streaming::state::StreamState;
use crate::types::Usage;
use crate::utils::CancelHandle;

/// Streaming events, keyed by their `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponsesEvent {
    #[serde(rename = "response.created")]
    Created { response: ResponseSnapshot },
    #[serde(rename = "response.in_progress")]
    InProgress { response: ResponseSnapshot },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta { delta: String },
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { item: OutputItem },
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta { item_id: String, delta: String },
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        item_id: String,
        arguments: Option<String>,
    },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone { item: OutputItem },
    #[serde(rename = "response.completed")]
    Completed { response: ResponseSnapshot },
    #[serde(rename = "response.incomplete")]
    Incomplete { response: ResponseSnapshot },
    #[serde(rename = "response.failed")]
    Failed { response: ResponseSnapshot },
    #[serde(rename = "error")]
    Error {
        code: Option<String>,
        message: Option<String>,
        param: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum OutputItem {
    #[serde(rename = "function_call")]
    FunctionCall {
        id: Option<String>,
        call_id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
    #[serde(rename = "message")]
    Message { content: Option<Vec<ContentPart>> },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "output_text")]
    OutputText { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseSnapshot {
    id: Option<String>,
    model: Option<String>,
    created_at: Option<i64>,
    service_tier: Option<String>,
    status: Option<String>,
    output: Option<Vec<OutputItem>>,
    usage: Option<ResponsesUsage>,
    incomplete_details: Option<IncompleteDetails>,
    error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
struct IncompleteDetails {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    total_tokens: Option<u32>,
    input_tokens_details: Option<InputTokensDetails>,
    output_tokens_details: Option<OutputTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct InputTokensDetails {
    cached_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OutputTokensDetails {
    reasoning_tokens: Option<u32>,
}

impl From<ResponsesUsage> for Usage {
    fn from(raw: ResponsesUsage) -> Self {
        Usage {
            input_tokens: raw.input_tokens,
            output_tokens: raw.output_tokens,
            total_tokens: raw
                .total_tokens
                .unwrap_or(raw.input_tokens + raw.output_tokens),
            cached_input_tokens: raw.input_tokens_details.and_then(|d| d.cached_tokens),
            reasoning_output_tokens: raw.output_tokens_details.and_then(|d| d.reasoning_tokens),
        }
    }
}

impl ResponseSnapshot {
    fn metadata(&self) -> Option<MetadataFragment> {
        let metadata = MetadataFragment {
            id: self.id.clone(),
            model: self.model.clone(),
            created: timestamp(self.created_at),
            service_tier: self.service_tier.clone(),
            system_fingerprint: None,
        };
        (!metadata.is_empty()).then_some(metadata)
    }

    /// `output_text` parts of all message items, in array order.
    fn output_text(&self) -> Option<String> {
        let output = self.output.as_ref()?;
        let mut text = String::new();
        for item in output {
            if let OutputItem::Message {
                content: Some(parts),
            } = item
            {
                for part in parts {
                    if let ContentPart::OutputText { text: t } = part {
                        text.push_str(t);
                    }
                }
            }
        }
        Some(text)
    }

    /// Status token for the finish-reason mapping.
    fn finish_status(&self, fallback: &str) -> String {
        let status = self.status.as_deref().unwrap_or(fallback);
        let filtered = self
            .incomplete_details
            .as_ref()
            .and_then(|d| d.reason.as_deref())
            == Some("content_filter");
        if status == "incomplete" && filtered {
            "content_filter".to_string()
        } else {
            status.to_string()
        }
    }
}

impl OutputItem {
    fn tool_call_fragment(self) -> Option<ToolCallFragment> {
        let OutputItem::FunctionCall {
            id,
            call_id,
            name,
            arguments,
        } = self
        else {
            return None;
        };
        let key = id.or_else(|| call_id.clone())?;
        let mut fragment = ToolCallFragment::item(key);
        fragment.id = call_id;
        fragment.name = name;
        fragment.arguments = arguments;
        Some(fragment)
    }
}

/// Map an in-stream error code to an HTTP-like status.
fn error_status(code: Option<&str>) -> u16 {
    match code {
        Some(c) if c.contains("rate_limit") => 429,
        Some("invalid_request_error" | "invalid_prompt") => 400,
        _ => 500,
    }
}

/// Decoder for Responses API streams.
///
/// Function calls are keyed by output item id and get indices in first-seen order. The
/// terminal event's `output` array, when present, is the final text.
#[derive(Debug)]
pub struct ResponsesDecoder {
    core: DecoderCore,
}

impl ResponsesDecoder {
    pub fn new(
        config: StreamConfig,
        handler: Arc<dyn CompletionHandler>,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            core: DecoderCore::new(StreamProtocol::Responses, config, handler, cancel),
        }
    }

    /// The builder fed by this decoder.
    pub fn builder(&self) -> &IncrementalResponseBuilder {
        self.core.builder()
    }

    fn handle(&self, event: ResponsesEvent) {
        match event {
            ResponsesEvent::Created { response } | ResponsesEvent::InProgress { response } => {
                if let Some(metadata) = response.metadata() {
                    self.core.apply(PartialDelta::metadata(metadata));
                }
            }
            ResponsesEvent::OutputTextDelta { delta } => {
                self.core.apply(PartialDelta::text(delta));
            }
            ResponsesEvent::ReasoningSummaryTextDelta { delta } => {
                self.core.apply(PartialDelta::reasoning(delta));
            }
            ResponsesEvent::OutputItemAdded { item } => {
                if let Some(fragment) = item.tool_call_fragment() {
                    self.core.apply(PartialDelta::tool_call(fragment));
                }
            }
            ResponsesEvent::FunctionCallArgumentsDelta { item_id, delta } => {
                self.core.apply(PartialDelta::tool_call(
                    ToolCallFragment::item(item_id).with_arguments(delta),
                ));
            }
            ResponsesEvent::FunctionCallArgumentsDone { item_id, arguments } => {
                let mut fragment = ToolCallFragment::item(item_id).done();
                fragment.arguments = arguments;
                self.core.apply(PartialDelta::tool_call(fragment));
            }
            ResponsesEvent::OutputItemDone { item } => {
                if let Some(fragment) = item.tool_call_fragment() {
                    self.core.apply(PartialDelta::tool_call(fragment.done()));
                }
            }
            ResponsesEvent::Completed { response } => self.terminal(response, "completed"),
            ResponsesEvent::Incomplete { response } => self.terminal(response, "incomplete"),
            ResponsesEvent::Failed { response } => {
                if let Some(error) = &response.error {
                    tracing::warn!(
                        code = error.code.as_deref().unwrap_or_default(),
                        message = error.message.as_deref().unwrap_or_default(),
                        "response failed"
                    );
                }
                self.terminal(response, "failed");
            }
            ResponsesEvent::Error {
                code,
                message,
                param,
            } => {
                let details = serde_json::json!({ "code": code, "param": param });
                self.core.fail(LlmError::ApiError {
                    code: error_status(code.as_deref()),
                    message: message.unwrap_or_else(|| "stream error".to_string()),
                    details: Some(details),
                });
            }
            ResponsesEvent::Unknown => {}
        }
    }

    fn terminal(&self, mut response: ResponseSnapshot, fallback_status: &str) {
        let status = response.finish_status(fallback_status);
        if let Some(text) = response.output_text() {
            self.core.builder().set_final_text(text);
        }

        // Function calls present only in the final snapshot still complete.
        let calls: Vec<PartialDelta> = response
            .output
            .take()
            .unwrap_or_default()
            .into_iter()
            .filter_map(OutputItem::tool_call_fragment)
            .map(|f| PartialDelta::tool_call(f.done()))
            .collect();
        for call in calls {
            self.core.apply(call);
        }

        self.core.apply(PartialDelta {
            finish_status: Some(status),
            usage: response.usage.take().map(Usage::from),
            metadata: response.metadata(),
            ..Default::default()
        });
        self.core.complete();
    }
}

impl EventDecoder for ResponsesDecoder {
    fn on_frame(&self, data: &str) {
        let Some(payload) = self.core.admit(data) else {
            return;
        };
        if let Some(event) = self.core.parse::<ResponsesEvent>(payload) {
            self.handle(event);
        }
    }

    fn on_end(&self) {
        self.core.end();
    }

    fn on_error(&self, error: LlmError) {
        self.core.fail(error);
    }

    fn state(&self) -> StreamState {
        self.core.state()
    }
}
