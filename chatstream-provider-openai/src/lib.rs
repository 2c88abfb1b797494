//! OpenAI-compatible Chat Completions provider for chatstream.
//!
//! Implements the [`Provider`] trait from `chatstream-types` against any
//! endpoint speaking the OpenAI Chat Completions SSE protocol (OpenAI,
//! DeepSeek, and most self-hosted gateways).
//!
//! # Usage
//!
//! ```no_run
//! use chatstream_provider_openai::OpenAiCompatible;
//!
//! let provider = OpenAiCompatible::new("sk-...", "https://api.deepseek.com")
//!     .model("deepseek-reasoner");
//! ```
//!
//! # Features
//!
//! - Full [`Provider`] implementation (streaming only; this system never
//!   requests non-streaming completions)
//! - Byte-accurate SSE line reassembly: fragments and multi-byte characters
//!   split across network chunks are buffered until a full line is available
//! - Per-line parse failures are logged and swallowed; one malformed line
//!   never aborts the stream
//! - Error mapping from HTTP status codes to [`ProviderError`] variants

pub mod client;
pub mod error;
pub mod streaming;

pub use client::OpenAiCompatible;

// Re-export chatstream-types for convenience
pub use chatstream_types::{Provider, ProviderError, StreamEvent, StreamHandle};
