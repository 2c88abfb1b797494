use chatstream_store::{
    FileKvCache, FileMessageStore, InMemoryKvCache, InMemoryMessageStore, KvCache, MessageStore,
};
use chatstream_types::{Message, Role, StoreError};
use chrono::{Duration, Utc};

fn message(id: &str, role: Role, content: &str) -> Message {
    Message {
        id: id.into(),
        role,
        content: content.into(),
        timestamp: Utc::now(),
        loading: false,
        error: false,
    }
}

// --- Upsert semantics ---

#[tokio::test]
async fn save_then_fetch_round_trips() {
    let store = InMemoryMessageStore::new();
    let messages = vec![
        message("m1", Role::User, "hi"),
        message("m2", Role::Assistant, "hello"),
    ];

    let receipt = store.save_messages(&messages, "c1", Some("hi")).await.unwrap();
    assert_eq!(receipt.conversation_id, "c1");
    assert_eq!(receipt.upserted, 2);
    assert_eq!(receipt.modified, 0);

    let fetched = store.fetch_messages("c1").await.unwrap();
    assert_eq!(fetched, messages);
}

#[tokio::test]
async fn identical_resave_is_idempotent() {
    let store = InMemoryMessageStore::new();
    let messages = vec![message("m1", Role::User, "hi")];

    store.save_messages(&messages, "c1", None).await.unwrap();
    let receipt = store.save_messages(&messages, "c1", None).await.unwrap();

    assert_eq!(receipt.upserted, 0);
    assert_eq!(receipt.modified, 0);
    assert_eq!(store.fetch_messages("c1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn resave_with_changed_content_overwrites() {
    let store = InMemoryMessageStore::new();
    let mut msg = message("m1", Role::Assistant, "partial");
    store
        .save_messages(std::slice::from_ref(&msg), "c1", None)
        .await
        .unwrap();

    msg.content = "complete".into();
    let receipt = store
        .save_messages(std::slice::from_ref(&msg), "c1", None)
        .await
        .unwrap();

    assert_eq!(receipt.upserted, 0);
    assert_eq!(receipt.modified, 1);
    let fetched = store.fetch_messages("c1").await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].content, "complete");
}

#[tokio::test]
async fn fetch_orders_by_timestamp() {
    let store = InMemoryMessageStore::new();
    let now = Utc::now();
    let mut older = message("m-old", Role::User, "first");
    older.timestamp = now - Duration::seconds(60);
    let newer = message("m-new", Role::Assistant, "second");

    // Save newest first; fetch must still come back oldest first.
    store
        .save_messages(&[newer, older], "c1", None)
        .await
        .unwrap();

    let fetched = store.fetch_messages("c1").await.unwrap();
    assert_eq!(fetched[0].id, "m-old");
    assert_eq!(fetched[1].id, "m-new");
}

#[tokio::test]
async fn fetch_unknown_conversation_returns_empty() {
    let store = InMemoryMessageStore::new();
    assert!(store.fetch_messages("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn save_without_conversation_id_is_rejected() {
    let store = InMemoryMessageStore::new();
    let result = store
        .save_messages(&[message("m1", Role::User, "hi")], "", None)
        .await;
    assert!(matches!(result, Err(StoreError::Validation(_))));
}

// --- Conversation records ---

#[tokio::test]
async fn first_save_creates_conversation_with_title() {
    let store = InMemoryMessageStore::new();
    store
        .save_messages(&[message("m1", Role::User, "hi")], "c1", Some("First question"))
        .await
        .unwrap();

    let conv = store.get_conversation("c1").await.unwrap();
    assert_eq!(conv.title, "First question");
}

#[tokio::test]
async fn first_save_without_title_gets_timestamp_default() {
    let store = InMemoryMessageStore::new();
    store
        .save_messages(&[message("m1", Role::User, "hi")], "c1", None)
        .await
        .unwrap();

    let conv = store.get_conversation("c1").await.unwrap();
    assert!(conv.title.starts_with("Conversation "));
}

#[tokio::test]
async fn later_save_with_title_retitles() {
    let store = InMemoryMessageStore::new();
    store
        .save_messages(&[message("m1", Role::User, "hi")], "c1", Some("old"))
        .await
        .unwrap();
    store
        .save_messages(&[message("m1", Role::User, "hi")], "c1", Some("new"))
        .await
        .unwrap();

    assert_eq!(store.get_conversation("c1").await.unwrap().title, "new");
}

#[tokio::test]
async fn get_unknown_conversation_is_not_found() {
    let store = InMemoryMessageStore::new();
    assert!(matches!(
        store.get_conversation("missing").await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_title_rejects_empty() {
    let store = InMemoryMessageStore::new();
    store
        .save_messages(&[message("m1", Role::User, "hi")], "c1", None)
        .await
        .unwrap();
    assert!(matches!(
        store.update_title("c1", "").await,
        Err(StoreError::Validation(_))
    ));
    store.update_title("c1", "renamed").await.unwrap();
    assert_eq!(store.get_conversation("c1").await.unwrap().title, "renamed");
}

#[tokio::test]
async fn list_conversations_sorted_by_update_time() {
    let store = InMemoryMessageStore::new();
    store
        .save_messages(&[message("m1", Role::User, "a")], "c1", Some("first"))
        .await
        .unwrap();
    store
        .save_messages(&[message("m2", Role::User, "b")], "c2", Some("second"))
        .await
        .unwrap();
    // Touch c1 again so it becomes the most recently updated.
    store
        .save_messages(&[message("m3", Role::User, "c")], "c1", None)
        .await
        .unwrap();

    let listed = store.list_conversations().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].conversation_id, "c1");
    assert_eq!(listed[1].conversation_id, "c2");
}

// --- Delete ---

#[tokio::test]
async fn delete_removes_conversation_and_messages() {
    let store = InMemoryMessageStore::new();
    store
        .save_messages(
            &[
                message("m1", Role::User, "hi"),
                message("m2", Role::Assistant, "hello"),
            ],
            "c1",
            None,
        )
        .await
        .unwrap();

    let deleted = store.delete_conversation("c1").await.unwrap();
    assert_eq!(deleted, 2);
    assert!(store.fetch_messages("c1").await.unwrap().is_empty());
    assert!(matches!(
        store.get_conversation("c1").await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_unknown_conversation_is_noop() {
    let store = InMemoryMessageStore::new();
    assert_eq!(store.delete_conversation("missing").await.unwrap(), 0);
}

#[tokio::test]
async fn delete_leaves_other_conversations_alone() {
    let store = InMemoryMessageStore::new();
    store
        .save_messages(&[message("m1", Role::User, "a")], "c1", None)
        .await
        .unwrap();
    store
        .save_messages(&[message("m2", Role::User, "b")], "c2", None)
        .await
        .unwrap();

    store.delete_conversation("c1").await.unwrap();
    assert_eq!(store.fetch_messages("c2").await.unwrap().len(), 1);
}

// --- File-backed store ---

#[tokio::test]
async fn file_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let messages = vec![
        message("m1", Role::User, "hi"),
        message("m2", Role::Assistant, "你好"),
    ];

    {
        let store = FileMessageStore::new(dir.path().to_path_buf());
        store
            .save_messages(&messages, "c1", Some("greeting"))
            .await
            .unwrap();
    }

    let reopened = FileMessageStore::new(dir.path().to_path_buf());
    assert_eq!(reopened.fetch_messages("c1").await.unwrap(), messages);
    assert_eq!(
        reopened.get_conversation("c1").await.unwrap().title,
        "greeting"
    );
}

#[tokio::test]
async fn file_store_upsert_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMessageStore::new(dir.path().to_path_buf());
    let messages = vec![message("m1", Role::User, "hi")];

    store.save_messages(&messages, "c1", None).await.unwrap();
    let receipt = store.save_messages(&messages, "c1", None).await.unwrap();

    assert_eq!(receipt.upserted, 0);
    assert_eq!(receipt.modified, 0);
    assert_eq!(store.fetch_messages("c1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn file_store_delete_removes_document() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMessageStore::new(dir.path().to_path_buf());
    store
        .save_messages(&[message("m1", Role::User, "hi")], "c1", None)
        .await
        .unwrap();

    assert_eq!(store.delete_conversation("c1").await.unwrap(), 1);
    assert!(store.fetch_messages("c1").await.unwrap().is_empty());
    assert_eq!(store.delete_conversation("c1").await.unwrap(), 0);
}

#[tokio::test]
async fn file_store_lists_conversations() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMessageStore::new(dir.path().to_path_buf());
    store
        .save_messages(&[message("m1", Role::User, "a")], "c1", Some("one"))
        .await
        .unwrap();
    store
        .save_messages(&[message("m2", Role::User, "b")], "c2", Some("two"))
        .await
        .unwrap();

    let listed = store.list_conversations().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].conversation_id, "c2");
}

#[tokio::test]
async fn file_store_list_on_missing_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMessageStore::new(dir.path().join("never-created"));
    assert!(store.list_conversations().await.unwrap().is_empty());
}

// --- KvCache ---

#[tokio::test]
async fn memory_cache_set_get_remove() {
    let cache = InMemoryKvCache::new();
    assert_eq!(cache.get("k").await.unwrap(), None);

    cache.set("k", "v1").await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), Some("v1".into()));

    cache.set("k", "v2").await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), Some("v2".into()));

    cache.remove("k").await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), None);
    cache.remove("k").await.unwrap();
}

#[tokio::test]
async fn file_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = FileKvCache::new(dir.path().to_path_buf());
        cache.set("current-conversation-id", "1700000000000").await.unwrap();
    }
    let reopened = FileKvCache::new(dir.path().to_path_buf());
    assert_eq!(
        reopened.get("current-conversation-id").await.unwrap(),
        Some("1700000000000".into())
    );
    assert_eq!(reopened.get("missing").await.unwrap(), None);
}
