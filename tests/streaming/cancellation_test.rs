//! Cancellation tests

use std::sync::Arc;

use futures_util::StreamExt;
use siumai_openai_stream::streaming::{
    ChatCompletionsDecoder, ChatStreamEvent, CompletionHandler, EventDecoder, ResponsesDecoder,
    StreamProtocol, StreamState, chat_stream_from_bytes,
};
use siumai_openai_stream::types::{AggregatedResponse, ToolExecutionRequest};
use siumai_openai_stream::utils::CancelHandle;
use siumai_openai_stream::{LlmError, StreamConfig};

#[path = "../support/stream_fixture.rs"]
mod support;

use support::{Call, RecordingHandler};

#[test]
fn cancel_after_two_of_five_events_suppresses_the_rest() {
    let handler = RecordingHandler::new();
    let cancel = CancelHandle::new();
    let decoder = ResponsesDecoder::new(StreamConfig::new(), handler.clone(), cancel.clone());

    let events = [
        r#"{"type":"response.output_text.delta","delta":"one "}"#,
        r#"{"type":"response.output_text.delta","delta":"two "}"#,
        r#"{"type":"response.output_item.added","item":{"type":"function_call","id":"fc_1","call_id":"call_1","name":"lookup","arguments":""}}"#,
        r#"{"type":"response.function_call_arguments.done","item_id":"fc_1","arguments":"{}"}"#,
        r#"{"type":"response.completed","response":{"status":"completed","output":[]}}"#,
    ];

    decoder.on_frame(events[0]);
    decoder.on_frame(events[1]);
    cancel.cancel();
    for event in &events[2..] {
        decoder.on_frame(event);
    }
    decoder.on_end();
    decoder.on_error(LlmError::StreamError("connection reset".into()));

    assert_eq!(
        handler.calls(),
        vec![Call::Text("one ".into()), Call::Text("two ".into())]
    );
    assert_eq!(decoder.state(), StreamState::Cancelled);
}

#[test]
fn cancel_before_first_frame_is_silent() {
    let handler = RecordingHandler::new();
    let cancel = CancelHandle::new();
    cancel.cancel();
    let decoder = ChatCompletionsDecoder::new(StreamConfig::new(), handler.clone(), cancel);

    decoder.on_frame(r#"{"choices":[{"delta":{"content":"hi"}}]}"#);
    decoder.on_frame("[DONE]");

    assert!(handler.calls().is_empty());
    assert_eq!(decoder.state(), StreamState::Cancelled);
}

/// Cancels the stream from inside its own text callback.
struct CancelOnText {
    cancel: CancelHandle,
    record: Arc<RecordingHandler>,
}

impl CompletionHandler for CancelOnText {
    fn on_partial_text(&self, text: &str) -> Result<(), LlmError> {
        self.cancel.cancel();
        self.record.on_partial_text(text)
    }

    fn on_tool_call_complete(
        &self,
        index: u32,
        request: &ToolExecutionRequest,
    ) -> Result<(), LlmError> {
        self.record.on_tool_call_complete(index, request)
    }

    fn on_complete_response(&self, response: AggregatedResponse) -> Result<(), LlmError> {
        self.record.on_complete_response(response)
    }

    fn on_error(&self, error: LlmError) -> Result<(), LlmError> {
        self.record.on_error(error)
    }
}

#[test]
fn cancelling_inside_a_callback_suppresses_the_rest_of_the_frame() {
    let record = RecordingHandler::new();
    let cancel = CancelHandle::new();
    let handler = Arc::new(CancelOnText {
        cancel: cancel.clone(),
        record: record.clone(),
    });
    let decoder = ChatCompletionsDecoder::new(StreamConfig::new(), handler, cancel);

    // Text and a finish in the same chunk: the text callback cancels before completion.
    decoder.on_frame(r#"{"choices":[{"delta":{"content":"only"},"finish_reason":"stop"}]}"#);
    decoder.on_frame("[DONE]");

    assert_eq!(record.calls(), vec![Call::Text("only".into())]);
    assert_eq!(decoder.state(), StreamState::Cancelled);
}

#[tokio::test]
async fn chat_stream_ends_when_cancelled() {
    let body = "data: {\"type\":\"response.output_text.delta\",\"delta\":\"a\"}\n\n";
    let bytes = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(body)])
        .chain(futures_util::stream::pending());

    let mut handle =
        chat_stream_from_bytes(bytes, StreamProtocol::Responses, StreamConfig::new()).unwrap();

    let first = handle.stream.next().await;
    assert_eq!(
        first,
        Some(Ok(ChatStreamEvent::ContentDelta { delta: "a".into() }))
    );

    handle.cancel.cancel();
    let next = tokio::time::timeout(std::time::Duration::from_millis(500), handle.stream.next())
        .await
        .expect("cancel should end the stream");
    assert!(next.is_none());
}
