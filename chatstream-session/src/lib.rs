//! Conversation session orchestration for chatstream.
//!
//! Owns the in-memory message list and the current conversation id, and
//! funnels every mutation through named operations: `send_message`,
//! `clear_messages`, `start_new_conversation`, `load_conversation`. A send
//! drives the provider stream through one of two buffer reconcilers
//! (throttled or incremental reveal), mirrors state to a durable key/value
//! cache on every mutation, and persists the finalized list to the message
//! store once no message is loading.

pub mod config;
pub mod reconcile;
pub mod session;

pub use config::{FAILURE_MESSAGE, SessionConfig, UpdatePolicy};
pub use reconcile::{RevealReconciler, ThrottledReconciler};
pub use session::ChatSession;
