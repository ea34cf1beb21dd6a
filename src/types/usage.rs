//! Token usage reported by a stream.

use serde::{Deserialize, Serialize};

/// Token usage statistics.
///
/// Chat completions report `prompt_tokens`/`completion_tokens`; the Responses API reports
/// `input_tokens`/`output_tokens`. Both land here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    /// Prompt tokens served from the provider cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_input_tokens: Option<u32>,
    /// Output tokens spent on hidden reasoning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_output_tokens: Option<u32>,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cached_input_tokens: None,
            reasoning_output_tokens: None,
        }
    }
}
