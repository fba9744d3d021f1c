pub const TABLE_API_KEYS: &str = "user_api_keys";
pub const TABLE_CONVERSATIONS: &str = "conversations";
pub const TABLE_COLUMNS: &str = "columns";
pub const TABLE_QUOTES: &str = "quotes";
pub const TABLE_BACKUPS: &str = "conversation_backups";

/// Object storage bucket holding backup payloads, keyed by `file_path`.
pub const BUCKET_BACKUPS: &str = "dumps";

pub const DEFAULT_CONVERSATION_LIMIT: u32 = 50;
pub const DEFAULT_QUOTE_LIMIT: u32 = 100;
pub const SEARCH_QUOTE_LIMIT: u32 = 50;

/// Projection used when listing backups; the full row is only read by id.
pub const BACKUP_SUMMARY_COLUMNS: &str = "id,version,message_count,file_path,created_at";
