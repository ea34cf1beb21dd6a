//! Stream decoding configuration.
//!
//! `StreamConfig` is plain data: it can be built with the `with_*` methods or deserialized
//! from an application config file section.
//!
//! ```rust,ignore
//! use siumai_openai_stream::StreamConfig;
//!
//! let config = StreamConfig::new()
//!     .with_provider("azure")
//!     .with_capture_raw_events(true);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Default end-of-stream sentinel used by OpenAI(-compatible) SSE streams.
pub const DEFAULT_DONE_MARKER: &str = "[DONE]";

fn default_provider() -> String {
    "openai".to_string()
}

fn default_done_marker() -> String {
    DEFAULT_DONE_MARKER.to_string()
}

/// Decoder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Provider name reported in `ResponseMetadata::provider`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Literal frame payload that marks the end of the stream.
    #[serde(default = "default_done_marker")]
    pub done_marker: String,
    /// Attach every raw frame to the final response.
    pub capture_raw_events: bool,
    /// Log every raw frame at `trace` level.
    pub log_frames: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            done_marker: default_done_marker(),
            capture_raw_events: false,
            log_frames: false,
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_done_marker(mut self, marker: impl Into<String>) -> Self {
        self.done_marker = marker.into();
        self
    }

    pub fn with_capture_raw_events(mut self, enabled: bool) -> Self {
        self.capture_raw_events = enabled;
        self
    }

    pub fn with_log_frames(mut self, enabled: bool) -> Self {
        self.log_frames = enabled;
        self
    }

    /// Check the configuration before a decoder is built from it.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.done_marker.trim().is_empty() {
            return Err(LlmError::ConfigurationError(
                "done_marker must not be blank".to_string(),
            ));
        }
        if self.provider.trim().is_empty() {
            return Err(LlmError::ConfigurationError(
                "provider must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
