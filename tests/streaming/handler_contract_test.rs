//! Handler contract tests: ordering, at-most-once delivery, failure isolation

use std::sync::Arc;

use siumai_openai_stream::streaming::{
    ChatCompletionsDecoder, CompletionHandler, EventDecoder, ResponsesDecoder, StreamState,
};
use siumai_openai_stream::types::{AggregatedResponse, MessageShape, ToolExecutionRequest};
use siumai_openai_stream::utils::CancelHandle;
use siumai_openai_stream::{LlmError, StreamConfig};

#[path = "../support/stream_fixture.rs"]
mod support;

use support::{Call, RecordingHandler};

fn responses(handler: &Arc<RecordingHandler>) -> ResponsesDecoder {
    ResponsesDecoder::new(StreamConfig::new(), handler.clone(), CancelHandle::new())
}

#[test]
fn lookup_scenario() {
    let handler = RecordingHandler::new();
    let decoder = responses(&handler);

    for frame in [
        r#"{"type":"response.output_item.added","item":{"type":"function_call","id":"A","call_id":"call_A","name":"lookup"}}"#,
        r#"{"type":"response.function_call_arguments.delta","item_id":"A","delta":"{\"q\":"}"#,
        r#"{"type":"response.function_call_arguments.delta","item_id":"A","delta":"\"x\"}"}"#,
        r#"{"type":"response.function_call_arguments.done","item_id":"A","arguments":"{\"q\":\"x\"}"}"#,
        r#"{"type":"response.completed","response":{"status":"completed","output":[]}}"#,
    ] {
        decoder.on_frame(frame);
    }

    let calls = handler.calls();
    assert_eq!(calls.len(), 2);
    let Call::ToolCall(index, request) = &calls[0] else {
        panic!("expected tool call first, got {calls:?}");
    };
    assert_eq!(*index, 0);
    assert_eq!(request.name, "lookup");
    assert_eq!(request.arguments, "{\"q\":\"x\"}");

    let Call::Complete(response) = &calls[1] else {
        panic!("expected completion second, got {calls:?}");
    };
    assert_eq!(response.message.shape(), MessageShape::ToolCalls);
    assert_eq!(response.tool_calls(), &[request.clone()]);
    assert!(response.message.text.is_none());
}

#[test]
fn arguments_done_before_name_completes_from_item_done() {
    let handler = RecordingHandler::new();
    let decoder = responses(&handler);

    for frame in [
        r#"{"type":"response.function_call_arguments.done","item_id":"A","arguments":"{}"}"#,
        r#"{"type":"response.output_item.done","item":{"type":"function_call","id":"A","call_id":"call_A","name":"lookup","arguments":"{}"}}"#,
        r#"{"type":"response.completed","response":{"status":"completed"}}"#,
    ] {
        decoder.on_frame(frame);
    }

    let calls = handler.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, 0);
    assert_eq!(calls[0].1, ToolExecutionRequest::new("call_A", "lookup", "{}"));
    let completions = handler.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].tool_calls().len(), 1);
}

#[test]
fn truncated_tool_call_is_not_reported() {
    let handler = RecordingHandler::new();
    let decoder = responses(&handler);

    for frame in [
        r#"{"type":"response.output_item.added","item":{"type":"function_call","id":"A","call_id":"call_A","name":"lookup"}}"#,
        r#"{"type":"response.function_call_arguments.delta","item_id":"A","delta":"{\"q\":"}"#,
        r#"{"type":"response.output_text.delta","delta":"Searching"}"#,
        r#"{"type":"response.incomplete","response":{"status":"incomplete","incomplete_details":{"reason":"max_output_tokens"}}}"#,
    ] {
        decoder.on_frame(frame);
    }

    assert!(handler.tool_calls().is_empty());
    let response = handler.completions().pop().expect("completion");
    assert!(response.tool_calls().is_empty());
    assert_eq!(response.message.shape(), MessageShape::Text);
    assert_eq!(decoder.state(), StreamState::Completed);
}

#[test]
fn stray_argument_delta_does_not_shift_indices() {
    let handler = RecordingHandler::new();
    let decoder = responses(&handler);

    for frame in [
        r#"{"type":"response.function_call_arguments.delta","item_id":"ghost","delta":"x"}"#,
        r#"{"type":"response.output_item.added","item":{"type":"function_call","id":"A","call_id":"call_A","name":"lookup"}}"#,
        r#"{"type":"response.function_call_arguments.done","item_id":"A","arguments":"{}"}"#,
        r#"{"type":"response.completed","response":{"status":"completed"}}"#,
    ] {
        decoder.on_frame(frame);
    }

    let calls = handler.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!((calls[0].0, calls[0].1.name.as_str()), (0, "lookup"));
    assert_eq!(decoder.builder().index_of_item("ghost"), None);
    assert_eq!(handler.completions().len(), 1);
}

#[test]
fn duplicate_done_events_notify_once() {
    let handler = RecordingHandler::new();
    let decoder = responses(&handler);

    decoder.on_frame(r#"{"type":"response.output_item.added","item":{"type":"function_call","id":"fc_1","call_id":"call_1","name":"f"}}"#);
    decoder.on_frame(r#"{"type":"response.function_call_arguments.done","item_id":"fc_1","arguments":"{}"}"#);
    decoder.on_frame(r#"{"type":"response.function_call_arguments.done","item_id":"fc_1","arguments":"{}"}"#);
    decoder.on_frame(r#"{"type":"response.output_item.done","item":{"type":"function_call","id":"fc_1","call_id":"call_1","name":"f","arguments":"{}"}}"#);
    decoder.on_frame(r#"{"type":"response.completed","response":{"status":"completed"}}"#);

    assert_eq!(handler.tool_calls().len(), 1);
    let response = handler.completions().pop().expect("completion");
    assert_eq!(response.tool_calls().len(), 1);
}

#[test]
fn empty_stream_completes_without_callback() {
    let handler = RecordingHandler::new();
    let decoder = responses(&handler);

    decoder.on_frame(r#"{"type":"response.completed","response":{"status":"completed","output":[]}}"#);

    assert_eq!(decoder.state(), StreamState::Completed);
    assert!(handler.calls().is_empty());
}

#[test]
fn text_and_tool_call_keeps_both() {
    let handler = RecordingHandler::new();
    let decoder =
        ChatCompletionsDecoder::new(StreamConfig::new(), handler.clone(), CancelHandle::new());

    decoder.on_frame(r#"{"choices":[{"delta":{"content":"Checking."}}]}"#);
    decoder.on_frame(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"lookup","arguments":"{}"}}]}}]}"#);
    decoder.on_frame("[DONE]");

    let response = handler.completions().pop().expect("completion");
    assert_eq!(response.message.shape(), MessageShape::TextAndToolCalls);
    assert_eq!(response.content_text(), "Checking.");
}

#[test]
fn malformed_frames_are_dropped() {
    let handler = RecordingHandler::new();
    let decoder =
        ChatCompletionsDecoder::new(StreamConfig::new(), handler.clone(), CancelHandle::new());

    decoder.on_frame(r#"{"choices":[{"delta":{"content":"a"}}]}"#);
    decoder.on_frame("not json at all");
    decoder.on_frame(r#"{"choices":[{"delta":{"content":"#);
    decoder.on_frame("   ");
    decoder.on_frame(r#"{"choices":[{"delta":{"content":"b"}}]}"#);
    decoder.on_end();

    assert!(handler.errors().is_empty());
    assert_eq!(handler.completions()[0].content_text(), "ab");
}

#[test]
fn transport_error_is_delivered_once_and_ends_the_stream() {
    let handler = RecordingHandler::new();
    let decoder =
        ChatCompletionsDecoder::new(StreamConfig::new(), handler.clone(), CancelHandle::new());

    decoder.on_frame(r#"{"choices":[{"delta":{"content":"a"}}]}"#);
    decoder.on_error(LlmError::StreamError("connection reset".into()));
    decoder.on_error(LlmError::StreamError("again".into()));
    decoder.on_frame(r#"{"choices":[{"delta":{"content":"b"}}]}"#);
    decoder.on_end();

    assert_eq!(decoder.state(), StreamState::Errored);
    assert_eq!(
        handler.calls(),
        vec![
            Call::Text("a".into()),
            Call::Error(LlmError::StreamError("connection reset".into())),
        ]
    );
}

#[test]
fn error_after_completion_is_ignored() {
    let handler = RecordingHandler::new();
    let decoder =
        ChatCompletionsDecoder::new(StreamConfig::new(), handler.clone(), CancelHandle::new());

    decoder.on_frame(r#"{"choices":[{"delta":{"content":"done"}}]}"#);
    decoder.on_frame("[DONE]");
    decoder.on_error(LlmError::StreamError("late".into()));

    assert_eq!(handler.completions().len(), 1);
    assert!(handler.errors().is_empty());
}

/// Panics on every text delta and fails every tool call.
struct Unruly {
    completions: std::sync::Mutex<Vec<AggregatedResponse>>,
}

impl CompletionHandler for Unruly {
    fn on_partial_text(&self, _text: &str) -> Result<(), LlmError> {
        panic!("handler bug");
    }

    fn on_tool_call_complete(
        &self,
        _index: u32,
        _request: &ToolExecutionRequest,
    ) -> Result<(), LlmError> {
        Err(LlmError::handler("rejected"))
    }

    fn on_complete_response(&self, response: AggregatedResponse) -> Result<(), LlmError> {
        self.completions.lock().unwrap().push(response);
        Ok(())
    }

    fn on_error(&self, _error: LlmError) -> Result<(), LlmError> {
        Ok(())
    }
}

#[test]
fn misbehaving_handler_does_not_break_decoding() {
    let handler = Arc::new(Unruly {
        completions: std::sync::Mutex::new(Vec::new()),
    });
    let decoder =
        ChatCompletionsDecoder::new(StreamConfig::new(), handler.clone(), CancelHandle::new());

    decoder.on_frame(r#"{"choices":[{"delta":{"content":"x"}}]}"#);
    decoder.on_frame(r#"{"choices":[{"delta":{"content":"y","tool_calls":[{"index":0,"id":"c","function":{"name":"f","arguments":"{}"}}]}}]}"#);
    decoder.on_frame("[DONE]");

    assert_eq!(decoder.state(), StreamState::Completed);
    let completions = handler.completions.lock().unwrap();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].content_text(), "xy");
    assert_eq!(completions[0].tool_calls().len(), 1);
}

#[test]
fn deliveries_from_different_threads_are_visible() {
    let handler = RecordingHandler::new();
    let decoder = Arc::new(responses(&handler));

    for frame in [
        r#"{"type":"response.output_text.delta","delta":"a"}"#,
        r#"{"type":"response.output_text.delta","delta":"b"}"#,
        r#"{"type":"response.completed","response":{"status":"completed"}}"#,
    ] {
        let decoder = Arc::clone(&decoder);
        std::thread::spawn(move || decoder.on_frame(frame))
            .join()
            .unwrap();
    }

    assert_eq!(handler.completions()[0].content_text(), "ab");
}
