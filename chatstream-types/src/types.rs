//! Core conversation and message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human user.
    User,
    /// An AI assistant.
    Assistant,
}

/// A message in a conversation.
///
/// `loading` and `error` are transient UI flags: an assistant placeholder is
/// created with `loading = true` before any content arrives, mutated in place
/// as fragments stream in, and settles exactly once (`loading = false`,
/// optionally `error = true`). Settled messages are the only ones eligible
/// for provider context and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique identifier; the upsert key at the persistence boundary.
    pub id: String,
    /// The role of the message author.
    pub role: Role,
    /// The message text.
    pub content: String,
    /// Creation time (ISO-8601 on the wire).
    pub timestamp: DateTime<Utc>,
    /// Set while an assistant response is still streaming.
    #[serde(default, skip_serializing_if = "is_false")]
    pub loading: bool,
    /// Set when the response terminated with a failure.
    #[serde(default, skip_serializing_if = "is_false")]
    pub error: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl Message {
    /// Create a settled user message.
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            loading: false,
            error: false,
        }
    }

    /// Create an assistant placeholder: empty content, `loading = true`.
    pub fn assistant_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: String::new(),
            timestamp: Utc::now(),
            loading: true,
            error: false,
        }
    }

    /// Whether this message is in a terminal, non-failed streaming state.
    ///
    /// Only settled messages enter the provider context window or the
    /// persisted record set.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.loading && !self.error
    }
}

/// A conversation record: a named, ordered collection of messages sharing
/// one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation identifier.
    pub conversation_id: String,
    /// Display title, derived from the first user message or a timestamp.
    pub title: String,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// When the conversation was last written to.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation record with both timestamps set to now.
    pub fn new(conversation_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One message of provider context: role + content only, transient flags and
/// identifiers stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    /// The role of the message author.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl From<&Message> for ContextMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

/// A streaming chat-completion request handed to a [`crate::Provider`].
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// System prompt; the provider substitutes its default when `None`.
    pub system: Option<String>,
    /// The bounded trailing window of settled conversation messages,
    /// oldest first.
    pub messages: Vec<ContextMessage>,
}
