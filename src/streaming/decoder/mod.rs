//! Event-to-delta decoders
//!
//! A decoder turns raw SSE frame payloads into [`PartialDelta`]s for one
//! [`IncrementalResponseBuilder`] and notifies the caller's handler through a
//! [`GuardedHandler`]. Two protocols are supported:
//!
//! - [`ChatCompletionsDecoder`]: `chat.completion.chunk` objects, terminated by the done marker
//!   or end of data.
//! - [`ResponsesDecoder`]: Responses API events discriminated by `type`, terminated by
//!   `response.completed` / `response.incomplete` / `response.failed`.
//!
//! Cancellation is polled at the top of every frame. Once observed, the stream is
//! `Cancelled` and the remaining frames are consumed without any callback.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::builder::{IncrementalResponseBuilder, StreamProtocol};
use super::delta::PartialDelta;
use super::handler::{CompletionHandler, GuardedHandler};
use super::state::{StateCell, StreamState};
use crate::config::StreamConfig;
use crate::error::LlmError;
use crate::utils::CancelHandle;

mod chat_completions;
mod responses;

pub use chat_completions::ChatCompletionsDecoder;
pub use responses::ResponsesDecoder;

/// Receives the frames of one stream.
///
/// The transport calls these one at a time, possibly from different threads.
pub trait EventDecoder: Send + Sync {
    /// One SSE `data` payload.
    fn on_frame(&self, data: &str);

    /// The transport reached end of data.
    fn on_end(&self);

    /// The transport failed.
    fn on_error(&self, error: LlmError);

    /// Current lifecycle state.
    fn state(&self) -> StreamState;
}

/// Build the decoder for `protocol`.
pub fn new_decoder(
    protocol: StreamProtocol,
    config: StreamConfig,
    handler: Arc<dyn CompletionHandler>,
    cancel: CancelHandle,
) -> Box<dyn EventDecoder> {
    match protocol {
        StreamProtocol::ChatCompletions => {
            Box::new(ChatCompletionsDecoder::new(config, handler, cancel))
        }
        StreamProtocol::Responses => Box::new(ResponsesDecoder::new(config, handler, cancel)),
    }
}

/// Shared plumbing behind both protocol decoders.
#[derive(Debug)]
pub(crate) struct DecoderCore {
    config: StreamConfig,
    builder: IncrementalResponseBuilder,
    handler: GuardedHandler,
    cancel: CancelHandle,
    state: StateCell,
}

impl DecoderCore {
    pub(crate) fn new(
        protocol: StreamProtocol,
        config: StreamConfig,
        handler: Arc<dyn CompletionHandler>,
        cancel: CancelHandle,
    ) -> Self {
        let builder = IncrementalResponseBuilder::new(protocol, config.provider.clone());
        Self {
            config,
            builder,
            handler: GuardedHandler::new(handler, cancel.clone()),
            cancel,
            state: StateCell::default(),
        }
    }

    pub(crate) fn builder(&self) -> &IncrementalResponseBuilder {
        &self.builder
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state.get()
    }

    /// Moves the stream to `Cancelled` once cancellation is observed.
    fn observe_cancel(&self) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        if self.state.terminate(StreamState::Cancelled) {
            tracing::debug!(provider = %self.config.provider, "stream cancelled; draining");
        }
        true
    }

    /// Common frame gate. Returns the payload to decode, or `None` when the frame was
    /// consumed here (blank, sentinel, cancelled or after a terminal state).
    pub(crate) fn admit<'a>(&self, data: &'a str) -> Option<&'a str> {
        if self.observe_cancel() || self.state.get().is_terminal() {
            return None;
        }
        let payload = data.trim();
        if payload.is_empty() {
            return None;
        }
        if self.config.log_frames {
            tracing::trace!(provider = %self.config.provider, frame = payload, "sse frame");
        }
        self.state.start_streaming();
        if payload == self.config.done_marker {
            self.complete();
            return None;
        }
        if self.config.capture_raw_events {
            self.builder.record_raw_event(payload);
        }
        Some(payload)
    }

    /// Parse a payload, dropping it with a debug log when it is not the expected JSON.
    pub(crate) fn parse<T: serde::de::DeserializeOwned>(&self, payload: &str) -> Option<T> {
        match serde_json::from_str(payload) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::debug!(%error, frame = payload, "dropping unparseable frame");
                None
            }
        }
    }

    /// Feed a delta to the builder and notify the handler.
    pub(crate) fn apply(&self, delta: PartialDelta) {
        if delta.is_empty() {
            return;
        }
        let text = delta.text.clone().filter(|t| !t.is_empty());
        let reasoning = delta.reasoning.clone().filter(|t| !t.is_empty());

        let completed = self.builder.append(delta);

        if let Some(text) = text {
            self.handler.partial_text(&text);
        }
        if let Some(reasoning) = reasoning {
            self.handler.partial_thinking(&reasoning);
        }
        for call in completed {
            self.handler.tool_call_complete(call.index, &call.request);
        }
    }

    /// `Streaming -> Completed`: flush open tool calls, build, deliver once.
    pub(crate) fn complete(&self) {
        if self.observe_cancel() || !self.state.terminate(StreamState::Completed) {
            return;
        }
        for call in self.builder.finish_pending() {
            self.handler.tool_call_complete(call.index, &call.request);
        }
        match self.builder.build() {
            Some(response) => {
                self.handler.complete(response);
            }
            None => {
                tracing::debug!(
                    provider = %self.config.provider,
                    "stream completed without content"
                );
            }
        }
    }

    /// `* -> Errored`: deliver the error once.
    pub(crate) fn fail(&self, error: LlmError) {
        if self.observe_cancel() {
            return;
        }
        if self.state.terminate(StreamState::Errored) {
            tracing::debug!(provider = %self.config.provider, %error, "stream failed");
            self.handler.error(error);
        }
    }

    /// End of data: completes a stream that is not terminal yet.
    pub(crate) fn end(&self) {
        if !self.state.get().is_terminal() {
            self.complete();
        }
    }
}

/// Unix seconds to UTC.
pub(crate) fn timestamp(seconds: Option<i64>) -> Option<DateTime<Utc>> {
    seconds.and_then(|s| DateTime::from_timestamp(s, 0))
}

static_assertions::assert_impl_all!(ChatCompletionsDecoder: Send, Sync);
static_assertions::assert_impl_all!(ResponsesDecoder: Send, Sync);
