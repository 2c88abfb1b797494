//! Error types for all chatstream crates.

/// Errors from provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    // Retryable errors
    /// Network-level error (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Rate limited by the provider.
    #[error("rate limited")]
    RateLimit,
    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),
    /// Provider service is temporarily unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    // Terminal errors
    /// Authentication/authorization failure.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Malformed or invalid request, including missing client configuration.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Requested model does not exist.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Error surfaced mid-stream.
    #[error("stream error: {0}")]
    Stream(String),
}

impl ProviderError {
    /// Whether this error is likely transient and the request can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimit | Self::Timeout(_) | Self::ServiceUnavailable(_)
        )
    }
}

/// Errors from the persistence boundary (message store, k/v cache).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unknown conversation or message id.
    #[error("not found: {0}")]
    NotFound(String),
    /// A required field was missing or invalid.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from conversation session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A provider stream is already in flight for this session.
    #[error("a send is already in flight for this session")]
    Busy,
    /// A conversation load returned no messages; session state is unchanged.
    #[error("no messages found for conversation {0}")]
    NoMessages(String),
    /// The persistence boundary failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
