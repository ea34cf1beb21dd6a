//! Cancellation utilities
//!
//! Cooperative cancellation for streams. Decoders poll the handle once per frame;
//! stream adapters additionally wake on it.

use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation.
///
/// Cancellation is permanent: once requested it can not be undone.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation. Decoders observing this handle stop notifying their handler
    /// at the next frame; wrapped streams end as soon as possible.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Wrap a ChatStream so it ends as soon as `handle` is cancelled.
pub fn cancellable_with(
    stream: crate::streaming::ChatStream,
    handle: &CancelHandle,
) -> crate::streaming::ChatStream {
    let token = handle.token.clone();
    let mut inner = stream;
    let s = async_stream::stream! {
        use futures::StreamExt;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                item = inner.next() => {
                    let Some(item) = item else { break };
                    yield item;
                }
            }
        }
    };
    Box::pin(s)
}
