//! Message and conversation persistence for chatstream.
//!
//! The [`MessageStore`] trait is the external persistence boundary: saves are
//! upserts keyed by message id, fetches return a conversation's messages
//! ordered by timestamp, and deletes remove a conversation together with all
//! of its messages. Two implementations are provided: an in-memory store for
//! testing and short-lived processes, and a file-backed store keeping one
//! JSON document per conversation.
//!
//! [`cache::KvCache`] is the separate durable key/value boundary used by the
//! session to mirror its state across restarts.

pub mod cache;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use chatstream_types::{Conversation, Message, StoreError};

pub use cache::{FileKvCache, InMemoryKvCache, KvCache};

/// Outcome of a batch save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    /// The conversation the batch was written to.
    pub conversation_id: String,
    /// Messages inserted for the first time.
    pub upserted: u64,
    /// Existing messages whose content actually changed.
    pub modified: u64,
}

/// Trait for persisting and loading conversation messages.
///
/// # Example
///
/// ```ignore
/// use chatstream_store::*;
///
/// let store = InMemoryMessageStore::new();
/// store.save_messages(&messages, "1700000000000", Some("First question")).await?;
/// let loaded = store.fetch_messages("1700000000000").await?;
/// ```
pub trait MessageStore: Send + Sync {
    /// Upsert a batch of messages into a conversation.
    ///
    /// Each message is keyed by its id, so re-saving an unchanged batch is a
    /// no-op. The conversation record is created if absent (falling back to a
    /// timestamp title when none is supplied) or retitled when a title is
    /// supplied; its `updated_at` is bumped on every save.
    fn save_messages(
        &self,
        messages: &[Message],
        conversation_id: &str,
        title: Option<&str>,
    ) -> impl Future<Output = Result<SaveReceipt, StoreError>> + Send;

    /// Fetch a conversation's messages ordered by timestamp ascending.
    ///
    /// An unknown conversation id yields an empty list, not an error, so the
    /// caller can render an empty state.
    fn fetch_messages(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Delete a conversation and all of its messages.
    ///
    /// Returns the number of messages removed; deleting an unknown
    /// conversation is a no-op returning 0.
    fn delete_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// List all conversation records, most recently updated first.
    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<Conversation>, StoreError>> + Send;

    /// Look up one conversation record.
    fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Conversation, StoreError>> + Send;

    /// Rename a conversation.
    fn update_title(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Title used when a conversation is created without one.
fn default_title() -> String {
    format!("Conversation {}", Utc::now().format("%Y-%m-%d %H:%M:%S"))
}

fn validate_save(conversation_id: &str) -> Result<(), StoreError> {
    if conversation_id.is_empty() {
        return Err(StoreError::Validation("missing conversation id".into()));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.is_empty() {
        return Err(StoreError::Validation("missing title".into()));
    }
    Ok(())
}

// ─── In-memory store ─────────────────────────────────────────────────────────

/// A message together with the conversation that owns it.
#[derive(Debug, Clone, PartialEq)]
struct MessageRecord {
    conversation_id: String,
    message: Message,
}

#[derive(Default)]
struct StoreInner {
    conversations: HashMap<String, Conversation>,
    /// Keyed by message id, the upsert key.
    messages: HashMap<String, MessageRecord>,
}

/// In-memory message store backed by hash maps behind an `RwLock`.
///
/// Suitable for testing and short-lived processes.
#[derive(Clone, Default)]
pub struct InMemoryMessageStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryMessageStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for InMemoryMessageStore {
    async fn save_messages(
        &self,
        messages: &[Message],
        conversation_id: &str,
        title: Option<&str>,
    ) -> Result<SaveReceipt, StoreError> {
        validate_save(conversation_id)?;
        let mut inner = self.inner.write().await;

        match inner.conversations.entry(conversation_id.to_string()) {
            Entry::Vacant(slot) => {
                let title = title.map_or_else(default_title, str::to_string);
                slot.insert(Conversation::new(conversation_id, title));
            }
            Entry::Occupied(mut slot) => {
                let conversation = slot.get_mut();
                if let Some(title) = title {
                    conversation.title = title.to_string();
                }
                conversation.updated_at = Utc::now();
            }
        }

        let mut receipt = SaveReceipt {
            conversation_id: conversation_id.to_string(),
            upserted: 0,
            modified: 0,
        };
        for message in messages {
            let record = MessageRecord {
                conversation_id: conversation_id.to_string(),
                message: message.clone(),
            };
            match inner.messages.insert(message.id.clone(), record) {
                None => receipt.upserted += 1,
                Some(prev) if prev.message != *message => receipt.modified += 1,
                Some(_) => {}
            }
        }
        Ok(receipt)
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .values()
            .filter(|r| r.conversation_id == conversation_id)
            .map(|r| r.message.clone())
            .collect();
        messages.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
        Ok(messages)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        inner.conversations.remove(conversation_id);
        let before = inner.messages.len();
        inner
            .messages
            .retain(|_, r| r.conversation_id != conversation_id);
        Ok((before - inner.messages.len()) as u64)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<Conversation> = inner.conversations.values().cloned().collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, StoreError> {
        let inner = self.inner.read().await;
        inner
            .conversations
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    async fn update_title(&self, conversation_id: &str, title: &str) -> Result<(), StoreError> {
        validate_title(title)?;
        let mut inner = self.inner.write().await;
        let conversation = inner
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;
        conversation.title = title.to_string();
        conversation.updated_at = Utc::now();
        Ok(())
    }
}

// ─── File-backed store ───────────────────────────────────────────────────────

/// On-disk document: one conversation and its messages.
#[derive(Debug, Serialize, Deserialize)]
struct ConversationDocument {
    conversation: Conversation,
    messages: Vec<Message>,
}

/// File-backed message store keeping one JSON document per conversation.
///
/// Each conversation is stored at `{directory}/{conversation_id}.json`.
#[derive(Debug, Clone)]
pub struct FileMessageStore {
    directory: PathBuf,
}

impl FileMessageStore {
    /// Create a new file-backed store at the given directory.
    ///
    /// The directory is created on the first save.
    #[must_use]
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    fn path_for(&self, conversation_id: &str) -> PathBuf {
        self.directory.join(format!("{conversation_id}.json"))
    }

    async fn read_document(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationDocument>, StoreError> {
        let data = match tokio::fs::read_to_string(self.path_for(conversation_id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let doc = serde_json::from_str(&data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(doc))
    }

    async fn write_document(&self, doc: &ConversationDocument) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tokio::fs::write(self.path_for(&doc.conversation.conversation_id), json).await?;
        Ok(())
    }
}

impl MessageStore for FileMessageStore {
    async fn save_messages(
        &self,
        messages: &[Message],
        conversation_id: &str,
        title: Option<&str>,
    ) -> Result<SaveReceipt, StoreError> {
        validate_save(conversation_id)?;

        let mut doc = match self.read_document(conversation_id).await? {
            Some(mut doc) => {
                if let Some(title) = title {
                    doc.conversation.title = title.to_string();
                }
                doc.conversation.updated_at = Utc::now();
                doc
            }
            None => ConversationDocument {
                conversation: Conversation::new(
                    conversation_id,
                    title.map_or_else(default_title, str::to_string),
                ),
                messages: Vec::new(),
            },
        };

        let mut receipt = SaveReceipt {
            conversation_id: conversation_id.to_string(),
            upserted: 0,
            modified: 0,
        };
        for message in messages {
            match doc.messages.iter_mut().find(|m| m.id == message.id) {
                Some(existing) => {
                    if existing != message {
                        *existing = message.clone();
                        receipt.modified += 1;
                    }
                }
                None => {
                    doc.messages.push(message.clone());
                    receipt.upserted += 1;
                }
            }
        }
        doc.messages
            .sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));

        self.write_document(&doc).await?;
        Ok(receipt)
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .read_document(conversation_id)
            .await?
            .map(|doc| doc.messages)
            .unwrap_or_default())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<u64, StoreError> {
        let count = self
            .read_document(conversation_id)
            .await?
            .map_or(0, |doc| doc.messages.len() as u64);
        match tokio::fs::remove_file(self.path_for(conversation_id)).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let mut conversations = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(conversations),
            Err(e) => return Err(StoreError::Io(e)),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let data = tokio::fs::read_to_string(&path).await?;
                match serde_json::from_str::<ConversationDocument>(&data) {
                    Ok(doc) => conversations.push(doc.conversation),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "skipping unreadable document: {e}");
                    }
                }
            }
        }
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, StoreError> {
        self.read_document(conversation_id)
            .await?
            .map(|doc| doc.conversation)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    async fn update_title(&self, conversation_id: &str, title: &str) -> Result<(), StoreError> {
        validate_title(title)?;
        let mut doc = self
            .read_document(conversation_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;
        doc.conversation.title = title.to_string();
        doc.conversation.updated_at = Utc::now();
        self.write_document(&doc).await
    }
}
