//! # siumai-openai-stream
//!
//! Streaming response aggregation and tool-call reconstruction for OpenAI chat-completions and
//! Responses API server-sent-event streams.
//!
//! A stream is decoded frame by frame into partial deltas, accumulated by an
//! [`IncrementalResponseBuilder`](streaming::IncrementalResponseBuilder), and reported through
//! a [`CompletionHandler`](streaming::CompletionHandler): partial text, each finished tool call,
//! then exactly one final response or one error. Cancelled streams go silent.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use siumai_openai_stream::prelude::*;
//!
//! let decoder = ResponsesDecoder::new(StreamConfig::new(), Arc::new(my_handler), cancel.clone());
//! SseDriver::new(&decoder).send(request_builder).await;
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod streaming;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use config::StreamConfig;
pub use error::LlmError;

/// Commonly used items.
pub mod prelude {
    pub use crate::config::StreamConfig;
    pub use crate::error::LlmError;
    pub use crate::streaming::{
        ChatCompletionsDecoder, ChatStream, ChatStreamEvent, ChatStreamHandle, CompletionHandler,
        EventDecoder, ResponsesDecoder, SseDriver, StreamProtocol, StreamState,
    };
    pub use crate::types::{
        AggregatedResponse, AssistantMessage, FinishReason, ToolExecutionRequest, Usage,
    };
    pub use crate::utils::CancelHandle;
}
