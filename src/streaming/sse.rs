//! SSE transport glue
//!
//! Turns a byte stream into SSE events with `eventsource-stream` and feeds their `data`
//! payloads to an [`EventDecoder`]. Events that arrive after the decoder reached a terminal
//! state are still read so the connection is drained.

use std::fmt::Display;

use eventsource_stream::Eventsource;
use futures::Stream;
use futures_util::StreamExt;

use super::decoder::EventDecoder;
use super::state::StreamState;
use crate::error::LlmError;

/// Drives one decoder from an SSE byte stream.
#[derive(Debug)]
pub struct SseDriver<'a, D: EventDecoder + ?Sized> {
    decoder: &'a D,
}

impl<'a, D: EventDecoder + ?Sized> SseDriver<'a, D> {
    pub fn new(decoder: &'a D) -> Self {
        Self { decoder }
    }

    /// Consume `bytes` to the end and return the decoder's final state.
    ///
    /// A transport failure is delivered to the decoder as `LlmError::StreamError` and stops
    /// reading.
    pub async fn drive<S, B, E>(&self, bytes: S) -> StreamState
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let events = bytes.eventsource();
        futures_util::pin_mut!(events);

        while let Some(event) = events.next().await {
            match event {
                Ok(event) => self.decoder.on_frame(&event.data),
                Err(e) => {
                    self.decoder
                        .on_error(LlmError::StreamError(format!("SSE parsing error: {e}")));
                    return self.decoder.state();
                }
            }
        }
        self.decoder.on_end();
        self.decoder.state()
    }

    /// Send a prepared request and drive the response.
    ///
    /// Connection failures and non-2xx statuses are delivered to the decoder's `on_error`,
    /// so every outcome reaches the handler through one path.
    pub async fn send(&self, request: reqwest::RequestBuilder) -> StreamState {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.decoder.on_error(LlmError::from(e));
                return self.decoder.state();
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            self.decoder.on_error(api_error(status.as_u16(), body));
            return self.decoder.state();
        }

        self.drive(response.bytes_stream()).await
    }
}

/// Build an `ApiError` from an error response body, using the OpenAI error envelope
/// (`{"error": {"message": ...}}`) when present.
pub(crate) fn api_error(status: u16, body: String) -> LlmError {
    let details = serde_json::from_str::<serde_json::Value>(&body).ok();
    let message = details
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or(body);
    LlmError::ApiError {
        code: status,
        message,
        details,
    }
}
