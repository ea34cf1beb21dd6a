//! Tool calling types

use serde::{Deserialize, Serialize};

/// A request from the model to invoke a named function with JSON-encoded arguments.
///
/// `arguments` is kept as the raw string the provider streamed; it is never parsed here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecutionRequest {
    /// Provider call id (`call_...`), used to correlate tool results.
    pub id: String,
    /// Function name.
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

impl ToolExecutionRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the arguments as JSON.
    pub fn arguments_json(&self) -> Result<serde_json::Value, crate::error::LlmError> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        Ok(serde_json::from_str(&self.arguments)?)
    }
}

/// A tool call that finished streaming, tagged with its stable index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedToolCall {
    pub index: u32,
    pub request: ToolExecutionRequest,
}
