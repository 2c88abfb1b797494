//! Streaming event types for incremental provider responses.

use std::pin::Pin;

use futures::Stream;

/// An event emitted while a provider response streams in.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// One extracted text fragment.
    TextDelta(String),
    /// The stream failed; no further fragments will arrive.
    Error(String),
}

/// Handle to a streaming completion response.
///
/// The underlying sequence is lazy, finite, and non-restartable: end of
/// stream is signaled by the reader returning `None`, not by any sentinel
/// value inside the data.
pub struct StreamHandle {
    /// The stream of events. Consume with `StreamExt::next()`.
    pub receiver: Pin<Box<dyn Stream<Item = StreamEvent> + Send>>,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

impl StreamHandle {
    /// Wrap a stream of events.
    pub fn new(stream: impl Stream<Item = StreamEvent> + Send + 'static) -> Self {
        Self {
            receiver: Box::pin(stream),
        }
    }
}
