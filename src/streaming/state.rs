//! Decoder lifecycle state.

use std::sync::Mutex;

use super::builder::lock;

/// Lifecycle of one decoded stream.
///
/// `Open -> Streaming -> {Completed | Cancelled | Errored}`; `Cancelled` and `Errored` can
/// also be entered straight from `Open`. Terminal states are final.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Open,
    Streaming,
    Completed,
    Cancelled,
    Errored,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Errored)
    }
}

/// Shared, memory-visible state cell.
#[derive(Debug, Default)]
pub(crate) struct StateCell {
    state: Mutex<StreamState>,
}

impl StateCell {
    pub(crate) fn get(&self) -> StreamState {
        *lock(&self.state)
    }

    /// `Open -> Streaming`; other states are left alone.
    pub(crate) fn start_streaming(&self) {
        let mut state = lock(&self.state);
        if *state == StreamState::Open {
            *state = StreamState::Streaming;
        }
    }

    /// Move to a terminal state. Returns `false` when the stream was already terminal.
    pub(crate) fn terminate(&self, to: StreamState) -> bool {
        debug_assert!(to.is_terminal());
        let mut state = lock(&self.state);
        if state.is_terminal() {
            return false;
        }
        tracing::debug!(from = ?*state, to = ?to, "stream state transition");
        *state = to;
        true
    }
}
