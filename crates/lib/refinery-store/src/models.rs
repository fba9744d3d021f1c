use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// API key row used to resolve the calling user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey {
    pub key: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
}

/// Conversation row as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chatgpt_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Conversation listing entry annotated with its quote count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: Option<String>,
    pub chatgpt_url: Option<String>,
    pub quote_count: u64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// A conversation together with its columns and quotes, both by position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub columns: Vec<Column>,
    pub quotes: Vec<Quote>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    pub id: String,
    pub conversation_id: String,
    pub name: String,
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Insert payload for a column; the store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewColumn {
    pub conversation_id: String,
    pub name: String,
    pub position: i64,
}

/// Partial column update. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl ColumnPatch {
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            position: None,
        }
    }

    #[must_use]
    pub const fn reposition(position: i64) -> Self {
        Self {
            name: None,
            position: Some(position),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub column_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Owning conversation fields embedded in quote listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuoteConversation {
    pub title: Option<String>,
    pub user_id: String,
}

/// Quote listing entry joined with its conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuoteRecord {
    #[serde(flatten)]
    pub quote: Quote,
    pub conversations: QuoteConversation,
}

/// Filters applied when listing a user's quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteFilter {
    pub conversation_id: Option<String>,
    pub column_id: Option<String>,
    /// Case-insensitive substring match on quote text.
    pub text: Option<String>,
    pub limit: u32,
}

/// Selects the quotes a column reassignment applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteSelector {
    /// Listed quotes, restricted to one conversation.
    Ids {
        conversation_id: String,
        ids: Vec<String>,
    },
    /// Every quote currently assigned to the column.
    Column(String),
}

/// Backup metadata row. The message payload lives in the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Backup {
    pub id: String,
    pub conversation_id: String,
    pub version: i64,
    #[serde(default)]
    pub message_count: Option<i64>,
    pub file_path: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupSummary {
    pub id: String,
    pub version: i64,
    pub message_count: Option<i64>,
    pub file_path: String,
    pub created_at: Option<String>,
}

impl From<&Backup> for BackupSummary {
    fn from(backup: &Backup) -> Self {
        Self {
            id: backup.id.clone(),
            version: backup.version,
            message_count: backup.message_count,
            file_path: backup.file_path.clone(),
            created_at: backup.created_at.clone(),
        }
    }
}

/// Backup metadata merged with its downloaded messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupDetail {
    #[serde(flatten)]
    pub backup: Backup,
    pub messages: Vec<Value>,
}
