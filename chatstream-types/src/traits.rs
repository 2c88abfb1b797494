//! The provider trait: the outbound chat-completion boundary.

use std::future::Future;

use crate::error::ProviderError;
use crate::stream::StreamHandle;
use crate::types::ChatRequest;

/// Streaming chat-completion provider.
///
/// Uses RPITIT (return position impl trait in trait), Rust 2024 native
/// async. Not object-safe by design; compose with generics `<P: Provider>`.
///
/// `complete_stream` resolves once the response stream is open (or the
/// request was rejected); fragments then arrive through the returned
/// [`StreamHandle`]. There is no mechanism to abort an open stream.
pub trait Provider: Send + Sync {
    /// Send a completion request and get a stream of events.
    fn complete_stream(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<StreamHandle, ProviderError>> + Send;
}
