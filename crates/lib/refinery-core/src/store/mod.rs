//! Store interfaces and backend implementations.
//!
//! The store layer is the only code that talks to the hosted table store and
//! the blob store. The control plane depends on the [`RefineryStore`] trait;
//! [`SupabaseStore`] is the production backend and [`MemoryStore`] backs tests.

pub mod memory;
pub mod supabase;

use std::{error::Error, fmt, future::Future};

use chrono::{DateTime, Utc};
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

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

#[derive(Debug)]
pub enum StoreError {
    Http(Box<reqwest::Error>),
    Api { status: u16, message: String },
    Download { path: String, message: String },
    Decode(String),
    InvalidInput(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "store request failed: {err}"),
            Self::Api { status, message } => write!(f, "{message} (status {status})"),
            Self::Download { path, message } => {
                write!(f, "failed to download {path}: {message}")
            }
            Self::Decode(message) => write!(f, "unexpected store response: {message}"),
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
        }
    }
}

impl Error for StoreError {}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Table and blob operations the control plane needs from a backend.
///
/// Methods never check ownership on their own unless they take a `user_id`;
/// the control plane resolves ownership before issuing writes.
pub trait RefineryStore: Send + Sync + 'static {
    /// Returns the user owning `key`, if the key exists.
    fn find_api_key_owner(
        &self,
        key: &str,
    ) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    fn touch_api_key(
        &self,
        key: &str,
        used_at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Lists a user's conversations, most recently updated first.
    fn list_conversations(
        &self,
        user_id: &str,
        search: Option<&str>,
        limit: u32,
    ) -> impl Future<Output = StoreResult<Vec<ConversationSummary>>> + Send;

    fn get_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> impl Future<Output = StoreResult<Option<Conversation>>> + Send;

    /// Lists a conversation's columns by ascending position.
    fn list_columns(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = StoreResult<Vec<Column>>> + Send;

    fn get_column(
        &self,
        column_id: &str,
    ) -> impl Future<Output = StoreResult<Option<Column>>> + Send;

    fn max_column_position(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = StoreResult<Option<i64>>> + Send;

    fn insert_column(
        &self,
        column: NewColumn,
    ) -> impl Future<Output = StoreResult<Column>> + Send;

    /// Applies `patch` and returns the updated row, or `None` if no row matched.
    fn update_column(
        &self,
        column_id: &str,
        patch: ColumnPatch,
    ) -> impl Future<Output = StoreResult<Option<Column>>> + Send;

    /// Returns whether a row was deleted.
    fn delete_column(&self, column_id: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Lists quotes whose conversation belongs to `user_id`, newest first.
    fn list_quotes(
        &self,
        user_id: &str,
        filter: &QuoteFilter,
    ) -> impl Future<Output = StoreResult<Vec<QuoteRecord>>> + Send;

    /// Lists every quote of a conversation by ascending position.
    fn list_conversation_quotes(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = StoreResult<Vec<Quote>>> + Send;

    fn get_quote(&self, quote_id: &str)
    -> impl Future<Output = StoreResult<Option<Quote>>> + Send;

    /// Assigns the selected quotes to `column_id` in one batched update and
    /// returns the rows that were updated.
    fn move_quotes(
        &self,
        selector: QuoteSelector,
        column_id: &str,
    ) -> impl Future<Output = StoreResult<Vec<Quote>>> + Send;

    /// Returns whether a row was deleted.
    fn delete_quote(&self, quote_id: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Lists backup metadata for a conversation, newest version first.
    fn list_backups(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = StoreResult<Vec<BackupSummary>>> + Send;

    fn get_backup(
        &self,
        backup_id: &str,
    ) -> impl Future<Output = StoreResult<Option<Backup>>> + Send;

    /// Downloads a backup payload from the backup bucket.
    fn download_blob(&self, path: &str) -> impl Future<Output = StoreResult<Vec<u8>>> + Send;
}
