use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use refinery_core::control::{ControlError, RefineryControlPlane, UserContext};
use refinery_core::store::{MemoryStore, RefineryStore, StoreError, StoreResult};
use refinery_store::models::{
    Backup,
    BackupSummary,
    Column,
    ColumnPatch,
    Conversation,
    ConversationSummary,
    NewColumn,
    Quote,
    QuoteFilter,
    QuoteRecord,
    QuoteSelector,
};
use serde_json::{Map, json};

fn conversation(id: &str, user_id: &str, title: &str, updated_at: &str) -> Conversation {
    Conversation {
        id: id.to_string(),
        user_id: user_id.to_string(),
        title: Some(title.to_string()),
        chatgpt_url: Some(format!("https://chatgpt.com/c/{id}")),
        created_at: Some("2025-01-01T00:00:00+00:00".to_string()),
        updated_at: Some(updated_at.to_string()),
        extra: Map::new(),
    }
}

fn column(id: &str, conversation_id: &str, position: i64) -> Column {
    Column {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        name: format!("Column {id}"),
        position,
        created_at: None,
        extra: Map::new(),
    }
}

fn quote(id: &str, conversation_id: &str, column_id: &str, text: &str, second: u32) -> Quote {
    Quote {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        column_id: Some(column_id.to_string()),
        text: text.to_string(),
        position: Some(i64::from(second)),
        created_at: Some(format!("2025-01-01T00:00:{second:02}+00:00")),
        extra: Map::new(),
    }
}

fn backup(id: &str, conversation_id: &str, version: i64, file_path: &str) -> Backup {
    Backup {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        version,
        message_count: Some(2),
        file_path: file_path.to_string(),
        created_at: Some("2025-02-01T00:00:00+00:00".to_string()),
        extra: Map::new(),
    }
}

/// Two users. `u1` owns c1 (three columns, three quotes), c2 (one column,
/// one quote) and c4 (empty); `u2` owns c3.
async fn seed(store: &MemoryStore) {
    store.add_api_key("key-1", "u1").await;
    store.add_api_key("key-2", "u2").await;

    store
        .add_conversation(conversation("c1", "u1", "Rust borrow checker", "2025-02-01T00:00:00+00:00"))
        .await;
    store
        .add_conversation(conversation("c2", "u1", "Cooking", "2025-03-01T00:00:00+00:00"))
        .await;
    store
        .add_conversation(conversation("c3", "u2", "Rust for someone else", "2025-04-01T00:00:00+00:00"))
        .await;
    store
        .add_conversation(conversation("c4", "u1", "Empty", "2025-01-15T00:00:00+00:00"))
        .await;

    store.add_column(column("col-a", "c1", 0)).await;
    store.add_column(column("col-b", "c1", 1)).await;
    store.add_column(column("col-c", "c1", 2)).await;
    store.add_column(column("col-solo", "c2", 0)).await;
    store.add_column(column("col-x", "c3", 0)).await;

    store.add_quote(quote("q1", "c1", "col-a", "Hello world", 1)).await;
    store.add_quote(quote("q2", "c1", "col-a", "they say HELLO", 2)).await;
    store.add_quote(quote("q3", "c1", "col-b", "goodbye", 3)).await;
    store.add_quote(quote("q4", "c2", "col-solo", "hello from the kitchen", 4)).await;
    store.add_quote(quote("q5", "c3", "col-x", "hello from u2", 5)).await;

    store.add_backup(backup("b1", "c1", 1, "u1/c1/v1.json")).await;
    store.add_backup(backup("b2", "c1", 2, "u1/c1/v2.json")).await;
    store.add_backup(backup("b3", "c3", 1, "u2/c3/v1.json")).await;
    store.add_backup(backup("b4", "c1", 3, "u1/c1/v3.json")).await;
    store
        .put_blob(
            "u1/c1/v1.json",
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#,
        )
        .await;
    store.put_blob("u2/c3/v1.json", "[]").await;
    store.put_blob("u1/c1/v3.json", "{not json").await;
}

async fn build_control_plane() -> RefineryControlPlane<MemoryStore> {
    let store = MemoryStore::new();
    seed(&store).await;
    RefineryControlPlane::new(store)
}

fn user(id: &str) -> UserContext {
    UserContext::new(id)
}

async fn column_of(store: &MemoryStore, quote_id: &str) -> Option<String> {
    store
        .quotes()
        .await
        .into_iter()
        .find(|quote| quote.id == quote_id)
        .and_then(|quote| quote.column_id)
}

async fn positions(control: &RefineryControlPlane<MemoryStore>) -> Vec<(String, i64)> {
    control
        .list_columns(&user("u1"), "c1")
        .await
        .expect("columns should list")
        .into_iter()
        .map(|column| (column.id, column.position))
        .collect()
}

#[tokio::test]
async fn list_conversations_is_scoped_to_the_caller() {
    let control = build_control_plane().await;

    for search in [None, Some("rust"), Some("else"), Some("")] {
        let conversations = control
            .list_conversations(&user("u1"), search, 50)
            .await
            .expect("listing should succeed");
        assert!(conversations.iter().all(|summary| summary.id != "c3"));
    }

    let all = control
        .list_conversations(&user("u1"), None, 0)
        .await
        .expect("listing should succeed");
    let ids: Vec<&str> = all.iter().map(|summary| summary.id.as_str()).collect();
    assert_eq!(ids, vec!["c2", "c1", "c4"]);
    assert_eq!(all[1].quote_count, 3);

    let rust = control
        .list_conversations(&user("u1"), Some("RUST"), 50)
        .await
        .expect("search should succeed");
    assert_eq!(rust.len(), 1);
    assert_eq!(rust[0].id, "c1");

    let limited = control
        .list_conversations(&user("u1"), None, 1)
        .await
        .expect("listing should succeed");
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn get_conversation_includes_ordered_columns_and_quotes() {
    let control = build_control_plane().await;

    let detail = control
        .get_conversation(&user("u1"), "c1")
        .await
        .expect("conversation should load");

    assert_eq!(detail.conversation.title.as_deref(), Some("Rust borrow checker"));
    let columns: Vec<&str> = detail.columns.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(columns, vec!["col-a", "col-b", "col-c"]);
    let quotes: Vec<&str> = detail.quotes.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(quotes, vec!["q1", "q2", "q3"]);

    let rendered = serde_json::to_value(&detail).expect("detail serializes");
    assert_eq!(rendered["id"], json!("c1"));
    assert_eq!(rendered["columns"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn create_column_appends_after_the_last_position() {
    let control = build_control_plane().await;

    let appended = control
        .create_column(&user("u1"), "c1", "Later")
        .await
        .expect("column should be created");
    assert_eq!(appended.position, 3);
    assert_eq!(appended.name, "Later");

    let first = control
        .create_column(&user("u1"), "c4", "First")
        .await
        .expect("column should be created");
    assert_eq!(first.position, 0);

    let second = control
        .create_column(&user("u1"), "c4", "Second")
        .await
        .expect("column should be created");
    assert_eq!(second.position, 1);
}

#[tokio::test]
async fn create_column_rejects_blank_names_and_foreign_conversations() {
    let control = build_control_plane().await;

    assert!(matches!(
        control.create_column(&user("u1"), "c1", "   ").await,
        Err(ControlError::InvalidInput(_))
    ));
    assert!(matches!(
        control.create_column(&user("u1"), "c3", "Sneaky").await,
        Err(ControlError::NotFound { .. })
    ));
}

#[tokio::test]
async fn rename_column_updates_the_name() {
    let control = build_control_plane().await;

    let renamed = control
        .rename_column(&user("u1"), "col-b", "Keepers")
        .await
        .expect("rename should succeed");

    assert_eq!(renamed.id, "col-b");
    assert_eq!(renamed.name, "Keepers");
    assert_eq!(renamed.position, 1);
}

#[tokio::test]
async fn delete_column_reassigns_quotes_to_the_first_sibling() {
    let control = build_control_plane().await;

    let deletion = control
        .delete_column(&user("u1"), "col-a")
        .await
        .expect("delete should succeed");

    assert!(deletion.success);
    assert_eq!(deletion.moved_quotes, 2);
    assert_eq!(deletion.target_column_id.as_deref(), Some("col-b"));

    let store = control.store();
    let quotes = store.quotes().await;
    assert!(
        quotes
            .iter()
            .all(|quote| quote.column_id.as_deref() != Some("col-a"))
    );
    assert_eq!(column_of(store, "q1").await.as_deref(), Some("col-b"));
    assert_eq!(column_of(store, "q2").await.as_deref(), Some("col-b"));
    assert_eq!(column_of(store, "q4").await.as_deref(), Some("col-solo"));
    assert!(store.columns().await.iter().all(|column| column.id != "col-a"));
}

#[tokio::test]
async fn delete_last_column_with_quotes_is_rejected() {
    let control = build_control_plane().await;

    let result = control.delete_column(&user("u1"), "col-solo").await;

    assert!(matches!(result, Err(ControlError::Conflict(_))));
    let store = control.store();
    assert!(store.columns().await.iter().any(|column| column.id == "col-solo"));
    assert_eq!(column_of(store, "q4").await.as_deref(), Some("col-solo"));
}

#[tokio::test]
async fn delete_last_empty_column_succeeds() {
    let control = build_control_plane().await;
    let only = control
        .create_column(&user("u1"), "c4", "Only")
        .await
        .expect("column should be created");

    let deletion = control
        .delete_column(&user("u1"), &only.id)
        .await
        .expect("empty last column can be deleted");

    assert_eq!(deletion.moved_quotes, 0);
    assert!(deletion.target_column_id.is_none());
    assert!(
        control
            .list_columns(&user("u1"), "c4")
            .await
            .expect("columns should list")
            .is_empty()
    );
}

#[tokio::test]
async fn reorder_columns_applies_list_order() {
    let control = build_control_plane().await;
    let order = vec!["col-c".to_string(), "col-a".to_string(), "col-b".to_string()];

    let ack = control
        .reorder_columns(&user("u1"), "c1", &order)
        .await
        .expect("reorder should succeed");

    assert!(ack.success);
    assert_eq!(
        positions(&control).await,
        vec![
            ("col-c".to_string(), 0),
            ("col-a".to_string(), 1),
            ("col-b".to_string(), 2),
        ]
    );
}

#[tokio::test]
async fn reorder_columns_rejects_anything_but_a_permutation() {
    let control = build_control_plane().await;
    let before = positions(&control).await;

    let invalid = [
        vec!["col-a".to_string(), "col-b".to_string()],
        vec!["col-a".to_string(), "col-a".to_string(), "col-b".to_string()],
        vec!["col-a".to_string(), "col-b".to_string(), "col-x".to_string()],
    ];
    for order in &invalid {
        let result = control.reorder_columns(&user("u1"), "c1", order).await;
        assert!(matches!(result, Err(ControlError::InvalidInput(_))));
    }

    assert_eq!(positions(&control).await, before);
}

#[tokio::test]
async fn list_quotes_joins_conversation_and_filters() {
    let control = build_control_plane().await;

    let all = control
        .list_quotes(&user("u1"), None, None, 0)
        .await
        .expect("quotes should list");
    let ids: Vec<&str> = all.iter().map(|record| record.quote.id.as_str()).collect();
    assert_eq!(ids, vec!["q4", "q3", "q2", "q1"]);
    assert!(all.iter().all(|record| record.conversations.user_id == "u1"));

    let in_column = control
        .list_quotes(&user("u1"), Some("c1"), Some("col-a"), 100)
        .await
        .expect("quotes should list");
    assert_eq!(in_column.len(), 2);

    let foreign_column = control
        .list_quotes(&user("u1"), None, Some("col-x"), 100)
        .await
        .expect("quotes should list");
    assert!(foreign_column.is_empty());

    let limited = control
        .list_quotes(&user("u1"), None, None, 2)
        .await
        .expect("quotes should list");
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn search_quotes_is_case_insensitive_and_owned() {
    let control = build_control_plane().await;

    let found = control
        .search_quotes(&user("u1"), "hello", None)
        .await
        .expect("search should succeed");
    let ids: Vec<&str> = found.iter().map(|record| record.quote.id.as_str()).collect();
    assert_eq!(ids, vec!["q4", "q2", "q1"]);

    let scoped = control
        .search_quotes(&user("u1"), "HELLO", Some("c2"))
        .await
        .expect("search should succeed");
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].quote.id, "q4");

    assert!(matches!(
        control.search_quotes(&user("u1"), "  ", None).await,
        Err(ControlError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn search_quotes_caps_results_at_fifty() {
    let store = MemoryStore::new();
    store
        .add_conversation(conversation("c1", "u1", "Many", "2025-01-01T00:00:00+00:00"))
        .await;
    store.add_column(column("col-a", "c1", 0)).await;
    for index in 0..60 {
        store
            .add_quote(quote(&format!("q{index}"), "c1", "col-a", "hello again", index))
            .await;
    }
    let control = RefineryControlPlane::new(store);

    let found = control
        .search_quotes(&user("u1"), "hello", None)
        .await
        .expect("search should succeed");

    assert_eq!(found.len(), 50);
}

#[tokio::test]
async fn move_quote_stays_within_its_conversation() {
    let control = build_control_plane().await;

    let moved = control
        .move_quote(&user("u1"), "q3", "col-c")
        .await
        .expect("move should succeed");
    assert_eq!(moved.column_id.as_deref(), Some("col-c"));

    assert!(matches!(
        control.move_quote(&user("u1"), "q3", "col-solo").await,
        Err(ControlError::InvalidInput(_))
    ));
    assert!(matches!(
        control.move_quote(&user("u1"), "q5", "col-a").await,
        Err(ControlError::NotFound { .. })
    ));
}

#[tokio::test]
async fn move_quotes_bulk_counts_only_existing_quotes() {
    let control = build_control_plane().await;
    let ids = vec![
        "q1".to_string(),
        "q2".to_string(),
        "missing".to_string(),
        "q5".to_string(),
        "q1".to_string(),
    ];

    let result = control
        .move_quotes_bulk(&user("u1"), &ids, "col-c")
        .await
        .expect("bulk move should succeed");

    assert_eq!(result.moved, 2);
    let store = control.store();
    assert_eq!(column_of(store, "q1").await.as_deref(), Some("col-c"));
    assert_eq!(column_of(store, "q2").await.as_deref(), Some("col-c"));
    assert_eq!(column_of(store, "q5").await.as_deref(), Some("col-x"));

    let empty = control
        .move_quotes_bulk(&user("u1"), &[], "col-c")
        .await
        .expect("empty bulk move should succeed");
    assert_eq!(empty.moved, 0);
}

#[tokio::test]
async fn move_quotes_bulk_skips_own_quotes_in_other_conversations() {
    let control = build_control_plane().await;
    let ids = vec!["q3".to_string(), "q4".to_string()];

    let result = control
        .move_quotes_bulk(&user("u1"), &ids, "col-c")
        .await
        .expect("bulk move should succeed");

    assert_eq!(result.moved, 1);
    let store = control.store();
    assert_eq!(column_of(store, "q3").await.as_deref(), Some("col-c"));
    assert_eq!(column_of(store, "q4").await.as_deref(), Some("col-solo"));
}

#[tokio::test]
async fn delete_quote_removes_only_owned_quotes() {
    let control = build_control_plane().await;

    let ack = control
        .delete_quote(&user("u1"), "q3")
        .await
        .expect("delete should succeed");
    assert!(ack.success);
    assert!(column_of(control.store(), "q3").await.is_none());

    assert!(matches!(
        control.delete_quote(&user("u1"), "q5").await,
        Err(ControlError::NotFound { .. })
    ));
    assert!(column_of(control.store(), "q5").await.is_some());
}

#[tokio::test]
async fn list_backups_orders_by_version() {
    let control = build_control_plane().await;

    let backups = control
        .list_backups(&user("u1"), "c1")
        .await
        .expect("backups should list");
    let versions: Vec<i64> = backups.iter().map(|backup| backup.version).collect();
    assert_eq!(versions, vec![3, 2, 1]);

    assert!(matches!(
        control.list_backups(&user("u1"), "c3").await,
        Err(ControlError::NotFound { .. })
    ));
}

#[tokio::test]
async fn get_backup_merges_metadata_and_messages() {
    let control = build_control_plane().await;

    let detail = control
        .get_backup(&user("u1"), "b1")
        .await
        .expect("backup should load");

    assert_eq!(detail.backup.version, 1);
    assert_eq!(detail.messages.len(), 2);
    assert_eq!(detail.messages[1]["content"], json!("hello"));
    let rendered = serde_json::to_value(&detail).expect("detail serializes");
    assert_eq!(rendered["file_path"], json!("u1/c1/v1.json"));
    assert_eq!(rendered["messages"][0]["role"], json!("user"));
}

#[tokio::test]
async fn get_backup_fails_without_partial_results() {
    let control = build_control_plane().await;

    assert!(matches!(
        control.get_backup(&user("u1"), "b2").await,
        Err(ControlError::Store(StoreError::Download { .. }))
    ));
    assert!(matches!(
        control.get_backup(&user("u1"), "b4").await,
        Err(ControlError::InvalidBackup(_))
    ));
    assert!(matches!(
        control.get_backup(&user("u1"), "b3").await,
        Err(ControlError::NotFound { .. })
    ));
    assert!(matches!(
        control.get_backup(&user("u1"), "nope").await,
        Err(ControlError::NotFound { .. })
    ));
}

#[tokio::test]
async fn foreign_rows_are_invisible() {
    let control = build_control_plane().await;
    let caller = user("u1");

    assert!(matches!(
        control.get_conversation(&caller, "c3").await,
        Err(ControlError::NotFound { .. })
    ));
    assert!(matches!(
        control.list_columns(&caller, "c3").await,
        Err(ControlError::NotFound { .. })
    ));
    assert!(matches!(
        control.rename_column(&caller, "col-x", "Mine now").await,
        Err(ControlError::NotFound { .. })
    ));
    assert!(matches!(
        control.delete_column(&caller, "col-x").await,
        Err(ControlError::NotFound { .. })
    ));
    assert!(matches!(
        control
            .reorder_columns(&caller, "c3", &["col-x".to_string()])
            .await,
        Err(ControlError::NotFound { .. })
    ));
    assert!(matches!(
        control
            .move_quotes_bulk(&caller, &["q1".to_string()], "col-x")
            .await,
        Err(ControlError::NotFound { .. })
    ));
}

/// Delegates to a `MemoryStore` and fails chosen writes.
struct FailingStore {
    inner: MemoryStore,
    fail_column_delete: bool,
    fail_update_call: Option<usize>,
    update_calls: AtomicUsize,
}

impl FailingStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_column_delete: false,
            fail_update_call: None,
            update_calls: AtomicUsize::new(0),
        }
    }

    fn injected() -> StoreError {
        StoreError::Api {
            status: 503,
            message: "injected failure".to_string(),
        }
    }
}

impl RefineryStore for FailingStore {
    async fn find_api_key_owner(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.find_api_key_owner(key).await
    }

    async fn touch_api_key(&self, key: &str, used_at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.touch_api_key(key, used_at).await
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        search: Option<&str>,
        limit: u32,
    ) -> StoreResult<Vec<ConversationSummary>> {
        self.inner.list_conversations(user_id, search, limit).await
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        self.inner.get_conversation(user_id, conversation_id).await
    }

    async fn list_columns(&self, conversation_id: &str) -> StoreResult<Vec<Column>> {
        self.inner.list_columns(conversation_id).await
    }

    async fn get_column(&self, column_id: &str) -> StoreResult<Option<Column>> {
        self.inner.get_column(column_id).await
    }

    async fn max_column_position(&self, conversation_id: &str) -> StoreResult<Option<i64>> {
        self.inner.max_column_position(conversation_id).await
    }

    async fn insert_column(&self, column: NewColumn) -> StoreResult<Column> {
        self.inner.insert_column(column).await
    }

    async fn update_column(
        &self,
        column_id: &str,
        patch: ColumnPatch,
    ) -> StoreResult<Option<Column>> {
        let call = self.update_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_update_call == Some(call) {
            return Err(Self::injected());
        }
        self.inner.update_column(column_id, patch).await
    }

    async fn delete_column(&self, column_id: &str) -> StoreResult<bool> {
        if self.fail_column_delete {
            return Err(Self::injected());
        }
        self.inner.delete_column(column_id).await
    }

    async fn list_quotes(
        &self,
        user_id: &str,
        filter: &QuoteFilter,
    ) -> StoreResult<Vec<QuoteRecord>> {
        self.inner.list_quotes(user_id, filter).await
    }

    async fn list_conversation_quotes(&self, conversation_id: &str) -> StoreResult<Vec<Quote>> {
        self.inner.list_conversation_quotes(conversation_id).await
    }

    async fn get_quote(&self, quote_id: &str) -> StoreResult<Option<Quote>> {
        self.inner.get_quote(quote_id).await
    }

    async fn move_quotes(
        &self,
        selector: QuoteSelector,
        column_id: &str,
    ) -> StoreResult<Vec<Quote>> {
        self.inner.move_quotes(selector, column_id).await
    }

    async fn delete_quote(&self, quote_id: &str) -> StoreResult<bool> {
        self.inner.delete_quote(quote_id).await
    }

    async fn list_backups(&self, conversation_id: &str) -> StoreResult<Vec<BackupSummary>> {
        self.inner.list_backups(conversation_id).await
    }

    async fn get_backup(&self, backup_id: &str) -> StoreResult<Option<Backup>> {
        self.inner.get_backup(backup_id).await
    }

    async fn download_blob(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.inner.download_blob(path).await
    }
}

#[tokio::test]
async fn failed_column_delete_moves_quotes_back() {
    let inner = MemoryStore::new();
    seed(&inner).await;
    let mut store = FailingStore::new(inner);
    store.fail_column_delete = true;
    let control = RefineryControlPlane::new(store);

    let result = control.delete_column(&user("u1"), "col-a").await;

    assert!(matches!(result, Err(ControlError::Store(StoreError::Api { .. }))));
    let inner = &control.store().inner;
    assert_eq!(column_of(inner, "q1").await.as_deref(), Some("col-a"));
    assert_eq!(column_of(inner, "q2").await.as_deref(), Some("col-a"));
    assert_eq!(column_of(inner, "q3").await.as_deref(), Some("col-b"));
}

#[tokio::test]
async fn failed_reorder_restores_previous_positions() {
    let inner = MemoryStore::new();
    seed(&inner).await;
    let mut store = FailingStore::new(inner);
    store.fail_update_call = Some(2);
    let control = RefineryControlPlane::new(store);
    let order = vec!["col-c".to_string(), "col-a".to_string(), "col-b".to_string()];

    let result = control.reorder_columns(&user("u1"), "c1", &order).await;

    assert!(matches!(result, Err(ControlError::Store(_))));
    let columns = control
        .list_columns(&user("u1"), "c1")
        .await
        .expect("columns should list");
    let positions: Vec<(&str, i64)> = columns
        .iter()
        .map(|column| (column.id.as_str(), column.position))
        .collect();
    assert_eq!(positions, vec![("col-a", 0), ("col-b", 1), ("col-c", 2)]);
}
