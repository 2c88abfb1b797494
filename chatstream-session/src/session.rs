//! The conversation session: owns the message list and conversation id.

use chrono::Utc;
use futures::StreamExt;
use uuid::Uuid;

use chatstream_store::{KvCache, MessageStore};
use chatstream_types::{
    ChatRequest, ContextMessage, Message, Provider, Role, SessionError, StreamEvent, StreamHandle,
};

use crate::config::{FAILURE_MESSAGE, SessionConfig, UpdatePolicy};
use crate::reconcile::{RevealReconciler, ThrottledReconciler};

/// Cache key holding the serialized message list.
const CACHE_MESSAGES_KEY: &str = "chat-messages";

/// Cache key holding the current conversation id.
const CACHE_CONVERSATION_KEY: &str = "current-conversation-id";

/// Maximum title length derived from the first user message, in characters.
const TITLE_MAX_CHARS: usize = 50;

/// A chat conversation session.
///
/// The single source of truth for the in-memory message list and the current
/// conversation id. All mutation goes through the named operations below;
/// state is mirrored to the [`KvCache`] on every mutation and persisted to
/// the [`MessageStore`] once a send completes with no message loading.
///
/// Only one provider stream may be active at a time: a `send_message` while
/// another is in flight returns [`SessionError::Busy`]. There is no way to
/// abort a stream once started.
pub struct ChatSession<P, S, C> {
    conversation_id: String,
    messages: Vec<Message>,
    provider: P,
    store: S,
    cache: C,
    config: SessionConfig,
    in_flight: bool,
}

impl<P: Provider, S: MessageStore, C: KvCache> ChatSession<P, S, C> {
    /// Create a fresh session with an empty message list and a newly minted
    /// conversation id.
    pub fn new(provider: P, store: S, cache: C, config: SessionConfig) -> Self {
        Self {
            conversation_id: mint_conversation_id(),
            messages: Vec::new(),
            provider,
            store,
            cache,
            config,
            in_flight: false,
        }
    }

    /// Create a session restored from the cache: the previous conversation id
    /// and message list, when present and readable, otherwise a fresh state.
    ///
    /// The cache is read only here; afterwards it is write-only.
    pub async fn resume(provider: P, store: S, cache: C, config: SessionConfig) -> Self {
        let conversation_id = match cache.get(CACHE_CONVERSATION_KEY).await {
            Ok(Some(id)) if !id.is_empty() => id,
            Ok(_) => mint_conversation_id(),
            Err(e) => {
                tracing::warn!("failed to read cached conversation id: {e}");
                mint_conversation_id()
            }
        };
        let messages = match cache.get(CACHE_MESSAGES_KEY).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("discarding unreadable cached messages: {e}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("failed to read cached messages: {e}");
                Vec::new()
            }
        };
        Self {
            conversation_id,
            messages,
            provider,
            store,
            cache,
            config,
            in_flight: false,
        }
    }

    /// The current conversation id.
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// The in-memory message list.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether a provider stream is currently active.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Send a user message and stream the assistant response.
    ///
    /// Appends the user message and an assistant placeholder, then drives the
    /// provider stream into the placeholder through the configured update
    /// policy. A provider or stream failure does not return an error: it
    /// settles the placeholder with [`FAILURE_MESSAGE`] and the error flag
    /// set, mirroring what the user sees.
    pub async fn send_message(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        self.in_flight = true;
        self.send_message_inner(text.into()).await;
        self.in_flight = false;
        Ok(())
    }

    async fn send_message_inner(&mut self, text: String) {
        let user = Message::user(Uuid::new_v4().to_string(), text);
        self.messages.push(user);

        let placeholder_id = Uuid::new_v4().to_string();
        self.messages
            .push(Message::assistant_placeholder(&placeholder_id));
        self.write_cache().await;

        let request = ChatRequest {
            system: self.config.system_prompt.clone(),
            messages: self.context_window(),
        };

        match self.provider.complete_stream(request).await {
            Ok(handle) => self.drive_stream(handle, &placeholder_id).await,
            Err(e) => {
                tracing::warn!("provider request failed: {e}");
                self.fail_message(&placeholder_id);
            }
        }

        self.write_cache().await;
        self.persist().await;
    }

    /// The bounded trailing window of provider context: every message except
    /// the just-added placeholder, minus loading/error messages, last
    /// `context_window` only.
    fn context_window(&self) -> Vec<ContextMessage> {
        let prior = &self.messages[..self.messages.len() - 1];
        let settled: Vec<ContextMessage> = prior
            .iter()
            .filter(|m| m.is_settled())
            .map(ContextMessage::from)
            .collect();
        let start = settled.len().saturating_sub(self.config.context_window);
        settled[start..].to_vec()
    }

    /// Drive a provider stream to completion through the configured policy.
    ///
    /// The throttle clock and the reveal ticker live on this task's stack;
    /// returning from here, whether on completion or failure, cancels them.
    async fn drive_stream(&mut self, handle: StreamHandle, target_id: &str) {
        let mut stream = handle.receiver;
        match self.config.update_policy {
            UpdatePolicy::Throttled { interval } => {
                let mut reconciler = ThrottledReconciler::new(interval);
                while let Some(event) = stream.next().await {
                    match event {
                        StreamEvent::TextDelta(fragment) => {
                            if let Some(visible) = reconciler.push(&fragment) {
                                self.set_content(target_id, visible);
                            }
                        }
                        StreamEvent::Error(msg) => {
                            tracing::warn!("stream failed: {msg}");
                            self.fail_message(target_id);
                            return;
                        }
                    }
                }
                self.settle_message(target_id, reconciler.finish());
            }
            UpdatePolicy::Reveal { tick } => {
                let mut reconciler = RevealReconciler::new();
                let mut ticker = tokio::time::interval(tick);
                loop {
                    tokio::select! {
                        event = stream.next() => match event {
                            Some(StreamEvent::TextDelta(fragment)) => reconciler.push(&fragment),
                            Some(StreamEvent::Error(msg)) => {
                                tracing::warn!("stream failed: {msg}");
                                self.fail_message(target_id);
                                return;
                            }
                            None => break,
                        },
                        _ = ticker.tick() => {
                            if let Some(visible) = reconciler.tick() {
                                self.set_content(target_id, visible);
                            }
                        }
                    }
                }
                // Keep ticking until the visible text catches up.
                while !reconciler.is_caught_up() {
                    ticker.tick().await;
                    if let Some(visible) = reconciler.tick() {
                        self.set_content(target_id, visible);
                    }
                }
                self.settle_message(target_id, reconciler.finish());
            }
        }
    }

    /// Update the visible content of a still-loading message.
    fn set_content(&mut self, id: &str, content: String) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) {
            msg.content = content;
        }
    }

    /// Settle a message with its terminal content. Happens exactly once per
    /// send, on the success path.
    fn settle_message(&mut self, id: &str, content: String) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) {
            msg.content = content;
            msg.loading = false;
        }
    }

    /// Settle a message as failed: the partial buffer is discarded from the
    /// visible slot and replaced with the fixed failure string.
    fn fail_message(&mut self, id: &str) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) {
            msg.content = FAILURE_MESSAGE.to_string();
            msg.loading = false;
            msg.error = true;
        }
    }

    /// Delete the current conversation at the store, then reset to an empty
    /// list under a newly minted conversation id.
    ///
    /// A store failure leaves the in-memory state unchanged.
    pub async fn clear_messages(&mut self) -> Result<(), SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        if !self.messages.is_empty() {
            self.store.delete_conversation(&self.conversation_id).await?;
        }
        self.messages.clear();
        self.conversation_id = mint_conversation_id();
        self.write_cache().await;
        Ok(())
    }

    /// Reset to an empty list under a new conversation id without deleting
    /// anything; the prior conversation remains persisted.
    pub async fn start_new_conversation(&mut self) -> Result<(), SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        self.messages.clear();
        self.conversation_id = mint_conversation_id();
        self.write_cache().await;
        Ok(())
    }

    /// Replace the session state with a stored conversation.
    ///
    /// When the store returns no messages, the current state is left
    /// untouched and [`SessionError::NoMessages`] is returned.
    pub async fn load_conversation(&mut self, conversation_id: &str) -> Result<(), SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        let fetched = self.store.fetch_messages(conversation_id).await?;
        if fetched.is_empty() {
            return Err(SessionError::NoMessages(conversation_id.to_string()));
        }
        self.messages = fetched;
        self.conversation_id = conversation_id.to_string();
        self.write_cache().await;
        Ok(())
    }

    /// Persist the message list to the store, fire-and-forget.
    ///
    /// Skipped entirely while any message is still loading, so partial
    /// content is never written. Transient flags are stripped at the
    /// boundary. Failures are logged; in-memory state is never rolled back.
    async fn persist(&self) {
        if self.messages.is_empty() {
            return;
        }
        if self.messages.iter().any(|m| m.loading) {
            tracing::debug!("skipping persistence while a message is still streaming");
            return;
        }
        let title = self.derive_title();
        let records: Vec<Message> = self
            .messages
            .iter()
            .map(|m| Message {
                loading: false,
                error: false,
                ..m.clone()
            })
            .collect();
        if let Err(e) = self
            .store
            .save_messages(&records, &self.conversation_id, Some(&title))
            .await
        {
            tracing::warn!("failed to save messages to store: {e}");
        }
    }

    /// Title: the first user message truncated to [`TITLE_MAX_CHARS`]
    /// characters, or a timestamp default when no user message exists.
    fn derive_title(&self) -> String {
        match self.messages.iter().find(|m| m.role == Role::User) {
            Some(first_user) => {
                let content = &first_user.content;
                if content.chars().count() > TITLE_MAX_CHARS {
                    let truncated: String = content.chars().take(TITLE_MAX_CHARS).collect();
                    format!("{truncated}...")
                } else {
                    content.clone()
                }
            }
            None => format!("Conversation {}", Utc::now().format("%Y-%m-%d %H:%M:%S")),
        }
    }

    /// Mirror the message list and conversation id to the durable cache.
    /// Failures are logged; the cache is best-effort.
    async fn write_cache(&self) {
        match serde_json::to_string(&self.messages) {
            Ok(json) => {
                if let Err(e) = self.cache.set(CACHE_MESSAGES_KEY, &json).await {
                    tracing::warn!("failed to cache messages: {e}");
                }
            }
            Err(e) => tracing::warn!("failed to serialize messages for cache: {e}"),
        }
        if let Err(e) = self
            .cache
            .set(CACHE_CONVERSATION_KEY, &self.conversation_id)
            .await
        {
            tracing::warn!("failed to cache conversation id: {e}");
        }
    }
}

/// Conversation ids are millisecond-timestamp tokens.
fn mint_conversation_id() -> String {
    Utc::now().timestamp_millis().to_string()
}
