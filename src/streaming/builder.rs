//! Incremental response builder
//!
//! Accumulates partial deltas for one stream and produces the final aggregated response.
//!
//! Deltas for one stream arrive one at a time, but not necessarily on the same thread, so
//! every mutable cell lives behind its own `Mutex` (or atomic). The builder is `Send + Sync`
//! and is shared by reference with the decoder that drives it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::assembly::{AssemblyInput, assemble};
use super::delta::{
    FragmentPhase, FunctionCallFragment, MetadataFragment, PartialDelta, ToolCallFragment,
    ToolCallKey,
};
use crate::types::{
    AggregatedResponse, CompletedToolCall, FinishReason, ResponseMetadata, ToolExecutionRequest,
    Usage,
};

/// Wire protocol a builder is fed from; selects the finish-status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProtocol {
    /// `chat.completion.chunk` deltas.
    ChatCompletions,
    /// Responses API item-streaming events.
    Responses,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Default, Clone)]
struct ToolCallBuffer {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallBuffer {
    fn to_request(&self) -> ToolExecutionRequest {
        ToolExecutionRequest::new(&self.id, &self.name, &self.arguments)
    }
}

#[derive(Debug, Default)]
struct ToolCallState {
    open: BTreeMap<u32, ToolCallBuffer>,
    index_by_item_id: HashMap<String, u32>,
    next_item_index: u32,
    completed: Vec<CompletedToolCall>,
    completed_item_ids: HashSet<String>,
    completed_indices: HashSet<u32>,
    legacy: Option<ToolCallBuffer>,
    legacy_notified: bool,
}

impl ToolCallState {
    /// Stable index for an item id; assigned on first sight and never changed.
    fn index_for_item(&mut self, item_id: &str) -> u32 {
        if let Some(index) = self.index_by_item_id.get(item_id) {
            return *index;
        }
        let index = self.next_item_index;
        self.next_item_index += 1;
        self.index_by_item_id.insert(item_id.to_string(), index);
        index
    }

    fn finalize(&mut self, index: u32) -> Option<CompletedToolCall> {
        let buffer = self.open.remove(&index)?;
        if !self.completed_indices.insert(index) {
            return None;
        }
        if buffer.name.is_empty() {
            tracing::warn!(index, "dropping streamed tool call without a function name");
            return None;
        }
        let completed = CompletedToolCall {
            index,
            request: buffer.to_request(),
        };
        self.completed.push(completed.clone());
        Some(completed)
    }

    fn apply_indexed(
        &mut self,
        index: u32,
        fragment: ToolCallFragment,
    ) -> Option<CompletedToolCall> {
        if self.completed_indices.contains(&index) {
            tracing::debug!(index, "ignoring fragment for an already completed tool call");
            return None;
        }
        let buffer = self.open.entry(index).or_default();
        // Chat completions may split id/name across fragments, so they concatenate too.
        if let Some(id) = fragment.id {
            buffer.id.push_str(&id);
        }
        if let Some(name) = fragment.name {
            buffer.name.push_str(&name);
        }
        if let Some(arguments) = fragment.arguments {
            buffer.arguments.push_str(&arguments);
        }
        match fragment.phase {
            FragmentPhase::Delta => None,
            FragmentPhase::Done => self.finalize(index),
        }
    }

    fn apply_item(
        &mut self,
        item_id: &str,
        fragment: ToolCallFragment,
    ) -> Option<CompletedToolCall> {
        if self.completed_item_ids.contains(item_id) {
            return None;
        }
        // Only fragments that name the call (added, item done, terminal output) open one.
        let announces = fragment.name.as_deref().is_some_and(|n| !n.trim().is_empty())
            || fragment.id.as_deref().is_some_and(|i| !i.trim().is_empty());
        let index = match self.index_by_item_id.get(item_id).copied() {
            Some(index) => index,
            None if announces => self.index_for_item(item_id),
            None => {
                tracing::debug!(item_id, "ignoring fragment for an unannounced tool call item");
                return None;
            }
        };
        let buffer = self.open.entry(index).or_default();

        // Item events repeat the full call id and name; keep the first one seen.
        if let Some(id) = non_blank(fragment.id)
            && buffer.id.is_empty()
        {
            buffer.id = id;
        }
        if let Some(name) = non_blank(fragment.name)
            && buffer.name.is_empty()
        {
            buffer.name = name;
        }

        match fragment.phase {
            FragmentPhase::Delta => {
                if let Some(arguments) = fragment.arguments {
                    buffer.arguments.push_str(&arguments);
                }
                None
            }
            FragmentPhase::Done => {
                if let Some(arguments) = fragment.arguments.filter(|a| !a.is_empty())
                    && arguments != buffer.arguments
                {
                    if !buffer.arguments.is_empty() {
                        tracing::debug!(
                            item_id,
                            "final tool call arguments differ from streamed deltas; using final"
                        );
                    }
                    buffer.arguments = arguments;
                }
                if buffer.name.is_empty() {
                    // A later item done or terminal output may still carry the name.
                    tracing::debug!(
                        item_id,
                        "tool call done before its name arrived; keeping it open"
                    );
                    return None;
                }
                let completed = self.finalize(index)?;
                self.completed_item_ids.insert(item_id.to_string());
                Some(completed)
            }
        }
    }

    fn apply_legacy(&mut self, fragment: FunctionCallFragment) {
        let buffer = self.legacy.get_or_insert_with(ToolCallBuffer::default);
        if let Some(name) = fragment.name {
            buffer.name.push_str(&name);
        }
        if let Some(arguments) = fragment.arguments {
            buffer.arguments.push_str(&arguments);
        }
    }
}

/// Accumulates one stream's deltas.
#[derive(Debug)]
pub struct IncrementalResponseBuilder {
    protocol: StreamProtocol,
    provider: String,
    text: Mutex<String>,
    final_text: Mutex<Option<String>>,
    reasoning: Mutex<String>,
    tool_calls: Mutex<ToolCallState>,
    finish_status: Mutex<Option<String>>,
    usage: Mutex<Option<Usage>>,
    metadata: Mutex<MetadataFragment>,
    raw_events: Mutex<Vec<String>>,
    built: AtomicBool,
}

impl IncrementalResponseBuilder {
    pub fn new(protocol: StreamProtocol, provider: impl Into<String>) -> Self {
        Self {
            protocol,
            provider: provider.into(),
            text: Mutex::new(String::new()),
            final_text: Mutex::new(None),
            reasoning: Mutex::new(String::new()),
            tool_calls: Mutex::new(ToolCallState::default()),
            finish_status: Mutex::new(None),
            usage: Mutex::new(None),
            metadata: Mutex::new(MetadataFragment::default()),
            raw_events: Mutex::new(Vec::new()),
            built: AtomicBool::new(false),
        }
    }

    pub fn protocol(&self) -> StreamProtocol {
        self.protocol
    }

    /// Apply one delta. Returns the tool calls this delta finalized, in completion order.
    pub fn append(&self, delta: PartialDelta) -> Vec<CompletedToolCall> {
        let PartialDelta {
            text,
            reasoning,
            tool_calls,
            function_call,
            finish_status,
            usage,
            metadata,
        } = delta;

        if let Some(text) = text.filter(|t| !t.is_empty()) {
            lock(&self.text).push_str(&text);
        }
        if let Some(reasoning) = reasoning.filter(|t| !t.is_empty()) {
            lock(&self.reasoning).push_str(&reasoning);
        }

        let mut completed = Vec::new();
        if !tool_calls.is_empty() || function_call.is_some() {
            let mut state = lock(&self.tool_calls);
            for fragment in tool_calls {
                let done = match fragment.key.clone() {
                    ToolCallKey::Index(index) => state.apply_indexed(index, fragment),
                    ToolCallKey::ItemId(item_id) => state.apply_item(&item_id, fragment),
                };
                completed.extend(done);
            }
            if let Some(function_call) = function_call {
                state.apply_legacy(function_call);
            }
        }

        if let Some(status) = non_blank(finish_status) {
            *lock(&self.finish_status) = Some(status);
        }
        if let Some(usage) = usage {
            *lock(&self.usage) = Some(usage);
        }
        if let Some(fragment) = metadata {
            self.merge_metadata(fragment);
        }

        completed
    }

    fn merge_metadata(&self, fragment: MetadataFragment) {
        let mut metadata = lock(&self.metadata);
        if let Some(id) = non_blank(fragment.id) {
            metadata.id = Some(id);
        }
        if let Some(model) = non_blank(fragment.model) {
            metadata.model = Some(model);
        }
        if let Some(created) = fragment.created {
            metadata.created = Some(created);
        }
        if let Some(tier) = non_blank(fragment.service_tier) {
            metadata.service_tier = Some(tier);
        }
        if let Some(fingerprint) = non_blank(fragment.system_fingerprint) {
            metadata.system_fingerprint = Some(fingerprint);
        }
    }

    /// Finalize every index-addressed call still in progress, in index order.
    ///
    /// Chat-completions calls have no explicit "done" event and complete here. Item-addressed
    /// calls complete only on their own done events, so any still open were cut short and are
    /// dropped. A legacy `function_call` is reported once with index 0 but stays out of the
    /// completed list.
    pub fn finish_pending(&self) -> Vec<CompletedToolCall> {
        let mut state = lock(&self.tool_calls);
        let item_indices: HashSet<u32> = state.index_by_item_id.values().copied().collect();
        let open: Vec<u32> = state.open.keys().copied().collect();

        let mut completed = Vec::new();
        for index in open {
            if item_indices.contains(&index) {
                state.open.remove(&index);
                tracing::debug!(index, "dropping tool call item that never finished");
            } else {
                completed.extend(state.finalize(index));
            }
        }

        if state.completed.is_empty() && !state.legacy_notified {
            if let Some(legacy) = state.legacy.as_ref().filter(|l| !l.name.is_empty()) {
                completed.push(CompletedToolCall {
                    index: 0,
                    request: legacy.to_request(),
                });
                state.legacy_notified = true;
            }
        }
        completed
    }

    /// Install the terminal snapshot text, which takes precedence over the accumulated deltas.
    pub fn set_final_text(&self, text: String) {
        {
            let streamed = lock(&self.text);
            if *streamed != text {
                tracing::debug!(
                    streamed_len = streamed.len(),
                    final_len = text.len(),
                    "terminal output text differs from streamed deltas"
                );
            }
        }
        *lock(&self.final_text) = Some(text);
    }

    /// Remember a raw frame for the final response.
    pub fn record_raw_event(&self, frame: &str) {
        lock(&self.raw_events).push(frame.to_string());
    }

    /// Text accumulated from deltas so far.
    pub fn text(&self) -> String {
        lock(&self.text).clone()
    }

    /// Index assigned to an item id, if it has been seen.
    pub fn index_of_item(&self, item_id: &str) -> Option<u32> {
        lock(&self.tool_calls).index_by_item_id.get(item_id).copied()
    }

    /// Tool calls completed so far, in completion order.
    pub fn completed_tool_calls(&self) -> Vec<CompletedToolCall> {
        lock(&self.tool_calls).completed.clone()
    }

    fn finish_reason(&self, has_tool_calls: bool) -> Option<FinishReason> {
        let status = lock(&self.finish_status).clone()?;
        Some(match self.protocol {
            StreamProtocol::ChatCompletions => FinishReason::from_chat_completion(&status),
            StreamProtocol::Responses => {
                FinishReason::from_response_status(&status, has_tool_calls)
            }
        })
    }

    /// Produce the final response. Only the first call yields a value; the buffers are
    /// handed over to the result.
    pub fn build(&self) -> Option<AggregatedResponse> {
        if self.built.swap(true, Ordering::AcqRel) {
            tracing::debug!("build() called more than once; ignoring");
            return None;
        }

        let streamed = std::mem::take(&mut *lock(&self.text));
        let text = lock(&self.final_text).take().unwrap_or(streamed);
        let thinking = std::mem::take(&mut *lock(&self.reasoning));

        let (tool_calls, legacy_call) = {
            let mut state = lock(&self.tool_calls);
            let calls: Vec<ToolExecutionRequest> = std::mem::take(&mut state.completed)
                .into_iter()
                .map(|c| c.request)
                .collect();
            (calls, state.legacy.take().map(|l| l.to_request()))
        };

        let finish_reason = self.finish_reason(!tool_calls.is_empty() || legacy_call.is_some());
        let fragment = std::mem::take(&mut *lock(&self.metadata));
        let metadata = ResponseMetadata {
            id: fragment.id,
            model: fragment.model,
            created: fragment.created,
            service_tier: fragment.service_tier,
            system_fingerprint: fragment.system_fingerprint,
            provider: self.provider.clone(),
        };

        assemble(AssemblyInput {
            text,
            thinking,
            tool_calls,
            legacy_call,
            usage: lock(&self.usage).take(),
            finish_reason,
            metadata,
            raw_events: std::mem::take(&mut *lock(&self.raw_events)),
        })
    }
}

static_assertions::assert_impl_all!(IncrementalResponseBuilder: Send, Sync);
