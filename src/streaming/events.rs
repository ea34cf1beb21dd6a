//! Stream adapter
//!
//! Exposes a decoded SSE stream as a [`ChatStream`] of [`ChatStreamEvent`]s instead of
//! handler callbacks. The SSE driver runs on a spawned Tokio task and forwards every
//! callback through an unbounded channel.

use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;

use super::builder::StreamProtocol;
use super::decoder::{EventDecoder, new_decoder};
use super::handler::CompletionHandler;
use super::sse::SseDriver;
use crate::config::StreamConfig;
use crate::error::LlmError;
use crate::types::{AggregatedResponse, ToolExecutionRequest};
use crate::utils::{CancelHandle, cancellable_with};

/// Events yielded by a [`ChatStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStreamEvent {
    /// Incremental assistant text
    ContentDelta { delta: String },
    /// Incremental reasoning text
    ThinkingDelta { delta: String },
    /// A tool call finished streaming
    ToolCallComplete {
        index: u32,
        request: ToolExecutionRequest,
    },
    /// Final aggregated response; always the last event of a successful stream
    StreamEnd { response: AggregatedResponse },
}

/// Chat Stream - pinned, boxed stream of [`ChatStreamEvent`]s.
///
/// A failed stream yields one `Err` and ends. A stream with no content ends without
/// `StreamEnd`.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatStreamEvent, LlmError>> + Send>>;

/// Chat stream with first-class cancellation handle
pub struct ChatStreamHandle {
    /// The underlying chat stream
    pub stream: ChatStream,
    /// Handle to cancel the stream
    pub cancel: CancelHandle,
}

type EventSender = mpsc::UnboundedSender<Result<ChatStreamEvent, LlmError>>;

/// Handler that forwards callbacks into a channel.
///
/// When the receiving side is gone the stream is cancelled, which stops all further
/// callbacks.
struct ChannelHandler {
    tx: EventSender,
    cancel: CancelHandle,
}

impl ChannelHandler {
    fn send(&self, item: Result<ChatStreamEvent, LlmError>) -> Result<(), LlmError> {
        if self.tx.send(item).is_err() {
            self.cancel.cancel();
            return Err(LlmError::handler("stream receiver dropped"));
        }
        Ok(())
    }
}

impl CompletionHandler for ChannelHandler {
    fn on_partial_text(&self, text: &str) -> Result<(), LlmError> {
        self.send(Ok(ChatStreamEvent::ContentDelta {
            delta: text.to_string(),
        }))
    }

    fn on_partial_thinking(&self, text: &str) -> Result<(), LlmError> {
        self.send(Ok(ChatStreamEvent::ThinkingDelta {
            delta: text.to_string(),
        }))
    }

    fn on_tool_call_complete(
        &self,
        index: u32,
        request: &ToolExecutionRequest,
    ) -> Result<(), LlmError> {
        self.send(Ok(ChatStreamEvent::ToolCallComplete {
            index,
            request: request.clone(),
        }))
    }

    fn on_complete_response(&self, response: AggregatedResponse) -> Result<(), LlmError> {
        self.send(Ok(ChatStreamEvent::StreamEnd { response }))
    }

    fn on_error(&self, error: LlmError) -> Result<(), LlmError> {
        self.send(Err(error))
    }
}

fn channel_stream(
    protocol: StreamProtocol,
    config: StreamConfig,
) -> Result<(Box<dyn EventDecoder>, ChatStreamHandle), LlmError> {
    config.validate()?;
    let cancel = CancelHandle::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler = Arc::new(ChannelHandler {
        tx,
        cancel: cancel.clone(),
    });
    let decoder = new_decoder(protocol, config, handler, cancel.clone());

    let receiver: ChatStream = Box::pin(async_stream::stream! {
        while let Some(item) = rx.recv().await {
            yield item;
        }
    });
    let stream = cancellable_with(receiver, &cancel);
    Ok((decoder, ChatStreamHandle { stream, cancel }))
}

/// Send `request` and expose the decoded SSE response as a [`ChatStream`].
///
/// Must be called inside a Tokio runtime.
pub fn into_chat_stream(
    request: reqwest::RequestBuilder,
    protocol: StreamProtocol,
    config: StreamConfig,
) -> Result<ChatStreamHandle, LlmError> {
    let (decoder, handle) = channel_stream(protocol, config)?;
    tokio::spawn(async move {
        let state = SseDriver::new(decoder.as_ref()).send(request).await;
        tracing::debug!(?state, "sse stream finished");
    });
    Ok(handle)
}

/// Decode an already-open SSE byte stream as a [`ChatStream`].
///
/// Must be called inside a Tokio runtime.
pub fn chat_stream_from_bytes<S, B, E>(
    bytes: S,
    protocol: StreamProtocol,
    config: StreamConfig,
) -> Result<ChatStreamHandle, LlmError>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let (decoder, handle) = channel_stream(protocol, config)?;
    tokio::spawn(async move {
        let state = SseDriver::new(decoder.as_ref()).drive(bytes).await;
        tracing::debug!(?state, "sse stream finished");
    });
    Ok(handle)
}
