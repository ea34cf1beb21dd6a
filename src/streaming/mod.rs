//! Streaming aggregation
//!
//! Reconstructs OpenAI streaming responses (chat completions and the Responses API) into a
//! single [`AggregatedResponse`](crate::types::AggregatedResponse):
//!
//! - [`delta`]: the fragment shapes decoders produce
//! - [`builder`]: the per-stream [`IncrementalResponseBuilder`]
//! - [`assembly`]: the final message-shape rule
//! - [`decoder`]: frame-to-delta decoders and their lifecycle
//! - [`handler`]: the [`CompletionHandler`] contract and its guard
//! - [`sse`]: SSE byte-stream transport glue
//! - [`events`]: the same outcome as a [`ChatStream`]

pub mod assembly;
pub mod builder;
pub mod decoder;
pub mod delta;
pub mod events;
pub mod handler;
pub mod sse;
pub mod state;

pub use assembly::{AssemblyInput, assemble, assemble_message};
pub use builder::{IncrementalResponseBuilder, StreamProtocol};
pub use decoder::{ChatCompletionsDecoder, EventDecoder, ResponsesDecoder, new_decoder};
pub use delta::{
    FragmentPhase, FunctionCallFragment, MetadataFragment, PartialDelta, ToolCallFragment,
    ToolCallKey,
};
pub use events::{
    ChatStream, ChatStreamEvent, ChatStreamHandle, chat_stream_from_bytes, into_chat_stream,
};
pub use handler::{CompletionHandler, GuardedHandler};
pub use sse::SseDriver;
pub use state::StreamState;
