//! In-memory store backend.
//!
//! Mirrors the filtering, ordering and ownership joins of the hosted backend
//! closely enough to run the control plane and the MCP server without a
//! network. Seed it with the `add_*` helpers.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use refinery_store::models::{
    ApiKey,
    Backup,
    BackupSummary,
    Column,
    ColumnPatch,
    Conversation,
    ConversationSummary,
    NewColumn,
    Quote,
    QuoteConversation,
    QuoteFilter,
    QuoteRecord,
    QuoteSelector,
};
use serde_json::Map;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RefineryStore, StoreError, StoreResult};

#[derive(Default)]
struct MemoryState {
    api_keys: Vec<ApiKey>,
    conversations: Vec<Conversation>,
    columns: Vec<Column>,
    quotes: Vec<Quote>,
    backups: Vec<Backup>,
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryState {
    fn conversation_owner(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.id == conversation_id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_api_key(&self, key: &str, user_id: &str) {
        self.state.write().await.api_keys.push(ApiKey {
            key: key.to_string(),
            user_id: user_id.to_string(),
            last_used_at: None,
        });
    }

    pub async fn add_conversation(&self, conversation: Conversation) {
        self.state.write().await.conversations.push(conversation);
    }

    pub async fn add_column(&self, column: Column) {
        self.state.write().await.columns.push(column);
    }

    pub async fn add_quote(&self, quote: Quote) {
        self.state.write().await.quotes.push(quote);
    }

    pub async fn add_backup(&self, backup: Backup) {
        self.state.write().await.backups.push(backup);
    }

    pub async fn put_blob(&self, path: &str, payload: impl Into<Vec<u8>>) {
        self.state
            .write()
            .await
            .blobs
            .insert(path.to_string(), payload.into());
    }

    pub async fn api_key(&self, key: &str) -> Option<ApiKey> {
        self.state
            .read()
            .await
            .api_keys
            .iter()
            .find(|api_key| api_key.key == key)
            .cloned()
    }

    /// Snapshot of every quote, in insertion order.
    pub async fn quotes(&self) -> Vec<Quote> {
        self.state.read().await.quotes.clone()
    }

    /// Snapshot of every column, in insertion order.
    pub async fn columns(&self) -> Vec<Column> {
        self.state.read().await.columns.clone()
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn take_limit(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

impl RefineryStore for MemoryStore {
    async fn find_api_key_owner(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.api_key(key).await.map(|api_key| api_key.user_id))
    }

    async fn touch_api_key(&self, key: &str, used_at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for api_key in state.api_keys.iter_mut().filter(|api_key| api_key.key == key) {
            api_key.last_used_at = Some(used_at.to_rfc3339());
        }
        Ok(())
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        search: Option<&str>,
        limit: u32,
    ) -> StoreResult<Vec<ConversationSummary>> {
        let state = self.state.read().await;
        let mut conversations: Vec<&Conversation> = state
            .conversations
            .iter()
            .filter(|conversation| conversation.user_id == user_id)
            .filter(|conversation| {
                search.is_none_or(|search| {
                    conversation
                        .title
                        .as_deref()
                        .is_some_and(|title| contains_ignore_case(title, search))
                })
            })
            .collect();
        conversations.sort_by_key(|conversation| Reverse(conversation.updated_at.clone()));

        Ok(conversations
            .into_iter()
            .take(take_limit(limit))
            .map(|conversation| ConversationSummary {
                id: conversation.id.clone(),
                title: conversation.title.clone(),
                chatgpt_url: conversation.chatgpt_url.clone(),
                quote_count: state
                    .quotes
                    .iter()
                    .filter(|quote| quote.conversation_id == conversation.id)
                    .count() as u64,
                created_at: conversation.created_at.clone(),
                updated_at: conversation.updated_at.clone(),
            })
            .collect())
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        let state = self.state.read().await;
        Ok(state
            .conversation_owner(conversation_id)
            .filter(|conversation| conversation.user_id == user_id)
            .cloned())
    }

    async fn list_columns(&self, conversation_id: &str) -> StoreResult<Vec<Column>> {
        let state = self.state.read().await;
        let mut columns: Vec<Column> = state
            .columns
            .iter()
            .filter(|column| column.conversation_id == conversation_id)
            .cloned()
            .collect();
        columns.sort_by_key(|column| column.position);
        Ok(columns)
    }

    async fn get_column(&self, column_id: &str) -> StoreResult<Option<Column>> {
        let state = self.state.read().await;
        Ok(state.columns.iter().find(|column| column.id == column_id).cloned())
    }

    async fn max_column_position(&self, conversation_id: &str) -> StoreResult<Option<i64>> {
        let state = self.state.read().await;
        Ok(state
            .columns
            .iter()
            .filter(|column| column.conversation_id == conversation_id)
            .map(|column| column.position)
            .max())
    }

    async fn insert_column(&self, column: NewColumn) -> StoreResult<Column> {
        let mut state = self.state.write().await;
        if state.conversation_owner(&column.conversation_id).is_none() {
            return Err(StoreError::Api {
                status: 409,
                message: format!(
                    "insert or update on table \"columns\" violates foreign key constraint for conversation {}",
                    column.conversation_id
                ),
            });
        }
        let column = Column {
            id: Uuid::new_v4().to_string(),
            conversation_id: column.conversation_id,
            name: column.name,
            position: column.position,
            created_at: Some(Utc::now().to_rfc3339()),
            extra: Map::new(),
        };
        state.columns.push(column.clone());
        Ok(column)
    }

    async fn update_column(
        &self,
        column_id: &str,
        patch: ColumnPatch,
    ) -> StoreResult<Option<Column>> {
        if patch == ColumnPatch::default() {
            return Err(StoreError::InvalidInput("column patch is empty".to_string()));
        }
        let mut state = self.state.write().await;
        let Some(column) = state.columns.iter_mut().find(|column| column.id == column_id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            column.name = name;
        }
        if let Some(position) = patch.position {
            column.position = position;
        }
        Ok(Some(column.clone()))
    }

    async fn delete_column(&self, column_id: &str) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let before = state.columns.len();
        state.columns.retain(|column| column.id != column_id);
        Ok(state.columns.len() != before)
    }

    async fn list_quotes(
        &self,
        user_id: &str,
        filter: &QuoteFilter,
    ) -> StoreResult<Vec<QuoteRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<QuoteRecord> = state
            .quotes
            .iter()
            .filter(|quote| {
                filter
                    .conversation_id
                    .as_deref()
                    .is_none_or(|id| quote.conversation_id == id)
            })
            .filter(|quote| {
                filter
                    .column_id
                    .as_deref()
                    .is_none_or(|id| quote.column_id.as_deref() == Some(id))
            })
            .filter(|quote| {
                filter
                    .text
                    .as_deref()
                    .is_none_or(|text| contains_ignore_case(&quote.text, text))
            })
            .filter_map(|quote| {
                let conversation = state
                    .conversation_owner(&quote.conversation_id)
                    .filter(|conversation| conversation.user_id == user_id)?;
                Some(QuoteRecord {
                    quote: quote.clone(),
                    conversations: QuoteConversation {
                        title: conversation.title.clone(),
                        user_id: conversation.user_id.clone(),
                    },
                })
            })
            .collect();
        records.sort_by_key(|record| Reverse(record.quote.created_at.clone()));
        records.truncate(take_limit(filter.limit));
        Ok(records)
    }

    async fn list_conversation_quotes(&self, conversation_id: &str) -> StoreResult<Vec<Quote>> {
        let state = self.state.read().await;
        let mut quotes: Vec<Quote> = state
            .quotes
            .iter()
            .filter(|quote| quote.conversation_id == conversation_id)
            .cloned()
            .collect();
        // Unpositioned quotes sort last, like `position.asc` in PostgREST.
        quotes.sort_by_key(|quote| (quote.position.is_none(), quote.position));
        Ok(quotes)
    }

    async fn get_quote(&self, quote_id: &str) -> StoreResult<Option<Quote>> {
        let state = self.state.read().await;
        Ok(state.quotes.iter().find(|quote| quote.id == quote_id).cloned())
    }

    async fn move_quotes(
        &self,
        selector: QuoteSelector,
        column_id: &str,
    ) -> StoreResult<Vec<Quote>> {
        let mut state = self.state.write().await;
        let mut moved = Vec::new();
        for quote in &mut state.quotes {
            let selected = match &selector {
                QuoteSelector::Ids {
                    conversation_id,
                    ids,
                } => quote.conversation_id == *conversation_id && ids.contains(&quote.id),
                QuoteSelector::Column(source) => quote.column_id.as_deref() == Some(source),
            };
            if selected {
                quote.column_id = Some(column_id.to_string());
                moved.push(quote.clone());
            }
        }
        Ok(moved)
    }

    async fn delete_quote(&self, quote_id: &str) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let before = state.quotes.len();
        state.quotes.retain(|quote| quote.id != quote_id);
        Ok(state.quotes.len() != before)
    }

    async fn list_backups(&self, conversation_id: &str) -> StoreResult<Vec<BackupSummary>> {
        let state = self.state.read().await;
        let mut backups: Vec<&Backup> = state
            .backups
            .iter()
            .filter(|backup| backup.conversation_id == conversation_id)
            .collect();
        backups.sort_by_key(|backup| Reverse(backup.version));
        Ok(backups.into_iter().map(BackupSummary::from).collect())
    }

    async fn get_backup(&self, backup_id: &str) -> StoreResult<Option<Backup>> {
        let state = self.state.read().await;
        Ok(state.backups.iter().find(|backup| backup.id == backup_id).cloned())
    }

    async fn download_blob(&self, path: &str) -> StoreResult<Vec<u8>> {
        let state = self.state.read().await;
        state
            .blobs
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::Download {
                path: path.to_string(),
                message: "Object not found".to_string(),
            })
    }
}
