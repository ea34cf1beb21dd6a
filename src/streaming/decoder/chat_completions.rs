//! `chat.completion.chunk` decoder.

use std::sync::Arc;

use serde::Deserialize;

use super::{DecoderCore, EventDecoder, timestamp};
use crate::config::StreamConfig;
use crate::error::LlmError;
use crate::streaming::builder::{IncrementalResponseBuilder, StreamProtocol};
use crate::streaming::delta::{
    FunctionCallFragment, MetadataFragment, PartialDelta, ToolCallFragment,
};
use crate::streaming::handler::CompletionHandler;
use crate::streaming::state::StreamState;
use crate::types::Usage;
use crate::utils::CancelHandle;

#[derive(Debug, Deserialize)]
struct Chunk {
    id: Option<String>,
    model: Option<String>,
    created: Option<i64>,
    service_tier: Option<String>,
    system_fingerprint: Option<String>,
    choices: Option<Vec<Choice>>,
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Option<Delta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
    // Reasoning models on OpenAI-compatible backends use any of these.
    reasoning_content: Option<String>,
    thinking: Option<String>,
    reasoning: Option<String>,
    function_call: Option<FunctionDelta>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: Option<u32>,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    total_tokens: Option<u32>,
    prompt_tokens_details: Option<PromptTokensDetails>,
    completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    cached_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionTokensDetails {
    reasoning_tokens: Option<u32>,
}

impl From<ChunkUsage> for Usage {
    fn from(raw: ChunkUsage) -> Self {
        Usage {
            input_tokens: raw.prompt_tokens,
            output_tokens: raw.completion_tokens,
            total_tokens: raw
                .total_tokens
                .unwrap_or(raw.prompt_tokens + raw.completion_tokens),
            cached_input_tokens: raw.prompt_tokens_details.and_then(|d| d.cached_tokens),
            reasoning_output_tokens: raw.completion_tokens_details.and_then(|d| d.reasoning_tokens),
        }
    }
}

impl Chunk {
    fn into_delta(self) -> PartialDelta {
        let metadata = MetadataFragment {
            id: self.id,
            model: self.model,
            created: timestamp(self.created),
            service_tier: self.service_tier,
            system_fingerprint: self.system_fingerprint,
        };
        let mut delta = PartialDelta {
            usage: self.usage.map(Usage::from),
            metadata: (!metadata.is_empty()).then_some(metadata),
            ..Default::default()
        };

        // Only the first choice is aggregated.
        let Some(choice) = self.choices.and_then(|c| c.into_iter().next()) else {
            return delta;
        };
        delta.finish_status = choice.finish_reason;

        let Some(d) = choice.delta else {
            return delta;
        };
        delta.text = d.content;
        delta.reasoning = d.reasoning_content.or(d.thinking).or(d.reasoning);
        delta.function_call = d.function_call.map(|f| FunctionCallFragment {
            name: f.name,
            arguments: f.arguments,
        });
        delta.tool_calls = d
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(position, call)| {
                // Some compatible backends omit `index` for single calls.
                let index = call.index.unwrap_or(position as u32);
                let mut fragment = ToolCallFragment::indexed(index);
                fragment.id = call.id;
                if let Some(function) = call.function {
                    fragment.name = function.name;
                    fragment.arguments = function.arguments;
                }
                fragment
            })
            .collect();
        delta
    }
}

/// Decoder for chat-completions streams.
///
/// Tool calls complete when the stream completes, in index order, before the final response.
/// `finish_reason` does not end the stream because the usage chunk follows it.
#[derive(Debug)]
pub struct ChatCompletionsDecoder {
    core: DecoderCore,
}

impl ChatCompletionsDecoder {
    pub fn new(
        config: StreamConfig,
        handler: Arc<dyn CompletionHandler>,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            core: DecoderCore::new(StreamProtocol::ChatCompletions, config, handler, cancel),
        }
    }

    /// The builder fed by this decoder.
    pub fn builder(&self) -> &IncrementalResponseBuilder {
        self.core.builder()
    }
}

impl EventDecoder for ChatCompletionsDecoder {
    fn on_frame(&self, data: &str) {
        let Some(payload) = self.core.admit(data) else {
            return;
        };
        if let Some(chunk) = self.core.parse::<Chunk>(payload) {
            self.core.apply(chunk.into_delta());
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
