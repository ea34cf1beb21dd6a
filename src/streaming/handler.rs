//! Completion handler contract
//!
//! [`CompletionHandler`] is what callers implement to observe a stream. Decoders never call
//! it directly; they go through [`GuardedHandler`], which owns the delivery rules:
//!
//! - nothing is delivered once cancellation has been observed;
//! - at most one terminal callback (`on_complete_response` or `on_error`) per stream;
//! - nothing is delivered after the terminal callback;
//! - errors returned by the handler, and panics raised in it, are logged and swallowed.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::LlmError;
use crate::types::{AggregatedResponse, ToolExecutionRequest};
use crate::utils::CancelHandle;

/// Callbacks invoked while a stream is decoded.
///
/// Calls for one stream are serialized but may arrive on different threads.
pub trait CompletionHandler: Send + Sync {
    /// A slice of assistant text, in arrival order.
    fn on_partial_text(&self, text: &str) -> Result<(), LlmError>;

    /// A slice of reasoning text.
    fn on_partial_thinking(&self, _text: &str) -> Result<(), LlmError> {
        Ok(())
    }

    /// A tool call finished streaming. Fires at most once per index.
    fn on_tool_call_complete(
        &self,
        index: u32,
        request: &ToolExecutionRequest,
    ) -> Result<(), LlmError>;

    /// The final response. Never fires together with `on_error`.
    fn on_complete_response(&self, response: AggregatedResponse) -> Result<(), LlmError>;

    /// The stream failed.
    fn on_error(&self, error: LlmError) -> Result<(), LlmError>;
}

impl<H: CompletionHandler + ?Sized> CompletionHandler for Arc<H> {
    fn on_partial_text(&self, text: &str) -> Result<(), LlmError> {
        (**self).on_partial_text(text)
    }

    fn on_partial_thinking(&self, text: &str) -> Result<(), LlmError> {
        (**self).on_partial_thinking(text)
    }

    fn on_tool_call_complete(
        &self,
        index: u32,
        request: &ToolExecutionRequest,
    ) -> Result<(), LlmError> {
        (**self).on_tool_call_complete(index, request)
    }

    fn on_complete_response(&self, response: AggregatedResponse) -> Result<(), LlmError> {
        (**self).on_complete_response(response)
    }

    fn on_error(&self, error: LlmError) -> Result<(), LlmError> {
        (**self).on_error(error)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Decorator enforcing the delivery rules around a caller's handler.
pub struct GuardedHandler {
    inner: Arc<dyn CompletionHandler>,
    cancel: CancelHandle,
    finished: AtomicBool,
}

impl std::fmt::Debug for GuardedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedHandler")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.finished.load(Ordering::Acquire))
            .finish()
    }
}

impl GuardedHandler {
    pub fn new(inner: Arc<dyn CompletionHandler>, cancel: CancelHandle) -> Self {
        Self {
            inner,
            cancel,
            finished: AtomicBool::new(false),
        }
    }

    /// Whether further callbacks are suppressed.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.finished.load(Ordering::Acquire)
    }

    pub fn partial_text(&self, text: &str) {
        if !self.is_closed() {
            self.invoke("on_partial_text", || self.inner.on_partial_text(text));
        }
    }

    pub fn partial_thinking(&self, text: &str) {
        if !self.is_closed() {
            self.invoke("on_partial_thinking", || self.inner.on_partial_thinking(text));
        }
    }

    pub fn tool_call_complete(&self, index: u32, request: &ToolExecutionRequest) {
        if !self.is_closed() {
            self.invoke("on_tool_call_complete", || {
                self.inner.on_tool_call_complete(index, request)
            });
        }
    }

    /// Deliver the final response. Returns `false` when it was suppressed.
    pub fn complete(&self, response: AggregatedResponse) -> bool {
        if !self.claim_terminal() {
            return false;
        }
        self.invoke("on_complete_response", || {
            self.inner.on_complete_response(response)
        });
        true
    }

    /// Deliver a stream failure. Returns `false` when it was suppressed.
    pub fn error(&self, error: LlmError) -> bool {
        if !self.claim_terminal() {
            tracing::debug!(%error, "suppressing stream error after terminal state");
            return false;
        }
        self.invoke("on_error", || self.inner.on_error(error));
        true
    }

    fn claim_terminal(&self) -> bool {
        !self.cancel.is_cancelled() && !self.finished.swap(true, Ordering::AcqRel)
    }

    fn invoke<F>(&self, callback: &'static str, f: F)
    where
        F: FnOnce() -> Result<(), LlmError>,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(callback, %error, "completion handler returned an error");
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(callback, panic = %message, "completion handler panicked");
            }
        }
    }
}

static_assertions::assert_impl_all!(GuardedHandler: Send, Sync);
