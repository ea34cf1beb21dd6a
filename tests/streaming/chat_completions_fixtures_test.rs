//! Chat-completions streaming fixtures tests

use siumai_openai_stream::StreamConfig;
use siumai_openai_stream::streaming::{ChatCompletionsDecoder, StreamState};
use siumai_openai_stream::types::{FinishReason, MessageShape, Usage};
use siumai_openai_stream::utils::CancelHandle;

#[path = "../support/stream_fixture.rs"]
mod support;

use support::{Call, RecordingHandler};

#[tokio::test]
async fn chat_text_with_trailing_usage_chunk() {
    let handler = RecordingHandler::new();
    let decoder = ChatCompletionsDecoder::new(
        StreamConfig::new().with_capture_raw_events(true),
        handler.clone(),
        CancelHandle::new(),
    );

    let state =
        support::drive_fixture("tests/fixtures/openai/chat_text_usage.sse", &decoder).await;
    assert_eq!(state, StreamState::Completed);

    assert_eq!(handler.text(), "Hello world");
    let completions = handler.completions();
    assert_eq!(completions.len(), 1);
    let response = &completions[0];
    assert_eq!(response.content_text(), "Hello world");
    assert_eq!(response.message.shape(), MessageShape::Text);
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));

    // The usage chunk arrives after finish_reason and must still be captured.
    let usage = response.usage.clone().expect("usage");
    assert_eq!(usage, Usage {
        input_tokens: 9,
        output_tokens: 2,
        total_tokens: 11,
        cached_input_tokens: Some(0),
        reasoning_output_tokens: None,
    });

    assert_eq!(response.metadata.id.as_deref(), Some("chatcmpl-abc"));
    assert_eq!(response.metadata.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(response.metadata.system_fingerprint.as_deref(), Some("fp_44709d6fcb"));
    assert_eq!(response.metadata.provider, "openai");
    // Five JSON frames; the keep-alive comment and the done marker are not recorded.
    assert_eq!(response.raw_events.len(), 5);

    assert!(matches!(handler.calls().last(), Some(Call::Complete(_))));
}

#[tokio::test]
async fn chat_parallel_tool_calls_complete_in_index_order() {
    let handler = RecordingHandler::new();
    let decoder =
        ChatCompletionsDecoder::new(StreamConfig::new(), handler.clone(), CancelHandle::new());

    support::drive_fixture("tests/fixtures/openai/chat_parallel_tool_calls.sse", &decoder).await;

    let calls = handler.tool_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, 0);
    assert_eq!(calls[0].1.id, "call_weather");
    assert_eq!(calls[0].1.name, "get_weather");
    assert_eq!(calls[0].1.arguments, "{\"city\":\"Paris\"}");
    assert_eq!(calls[1].0, 1);
    assert_eq!(calls[1].1.name, "get_time");
    assert_eq!(calls[1].1.arguments_json().unwrap()["tz"], "CET");

    let response = handler.completions().pop().expect("completion");
    assert_eq!(response.message.shape(), MessageShape::ToolCalls);
    assert_eq!(response.tool_calls().len(), 2);
    assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
    assert_eq!(response.usage.map(|u| u.total_tokens), Some(120));

    // Every tool call notification precedes the final response.
    let kinds: Vec<&str> = handler
        .calls()
        .iter()
        .map(|c| match c {
            Call::ToolCall(..) => "tool",
            Call::Complete(_) => "complete",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["tool", "tool", "complete"]);
}

#[tokio::test]
async fn end_of_data_without_done_marker_completes() {
    let handler = RecordingHandler::new();
    let decoder =
        ChatCompletionsDecoder::new(StreamConfig::new(), handler.clone(), CancelHandle::new());

    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"no marker\"}}]}\n\n";
    let state = siumai_openai_stream::streaming::SseDriver::new(&decoder)
        .drive(futures_util::stream::iter(vec![Ok::<_, std::io::Error>(body)]))
        .await;

    assert_eq!(state, StreamState::Completed);
    assert_eq!(handler.completions()[0].content_text(), "no marker");
}

#[tokio::test]
async fn custom_done_marker() {
    let handler = RecordingHandler::new();
    let decoder = ChatCompletionsDecoder::new(
        StreamConfig::new().with_done_marker("[END]"),
        handler.clone(),
        CancelHandle::new(),
    );
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n\
                data: [END]\n\n\
                data: {\"choices\":[{\"delta\":{\"content\":\"after\"}}]}\n\n";
    siumai_openai_stream::streaming::SseDriver::new(&decoder)
        .drive(futures_util::stream::iter(vec![Ok::<_, std::io::Error>(body)]))
        .await;

    assert_eq!(handler.text(), "a");
    assert_eq!(handler.completions()[0].content_text(), "a");
}
