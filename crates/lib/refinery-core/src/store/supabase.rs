//! PostgREST and object storage backend.
//!
//! Talks to a hosted Supabase project with the service credential: table rows
//! through `/rest/v1` and backup payloads through `/storage/v1/object`.

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
use refinery_store::schema::{
    BACKUP_SUMMARY_COLUMNS,
    BUCKET_BACKUPS,
    TABLE_API_KEYS,
    TABLE_BACKUPS,
    TABLE_COLUMNS,
    TABLE_CONVERSATIONS,
    TABLE_QUOTES,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{RefineryStore, StoreError, StoreResult};

const REST_PATH: &str = "/rest/v1";
const STORAGE_SEGMENTS: [&str; 3] = ["storage", "v1", "object"];
const PREFER_REPRESENTATION: &str = "return=representation";

type QueryPair = (&'static str, String);

/// Store backend for a hosted Supabase project.
#[derive(Clone)]
pub struct SupabaseStore {
    base_url: String,
    service_key: String,
    client: Client,
}

impl SupabaseStore {
    #[must_use]
    pub fn new(base_url: &str, service_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, service_key)
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: &str, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            client,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}{REST_PATH}/{table}", self.base_url)
    }

    /// Object URL with the bucket and every path segment percent-encoded.
    fn object_url(&self, bucket: &str, path: &str) -> StoreResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|err| {
            StoreError::InvalidInput(format!("invalid store URL {}: {err}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                StoreError::InvalidInput(format!("store URL cannot take a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(STORAGE_SEGMENTS)
            .push(bucket)
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[QueryPair],
    ) -> StoreResult<Vec<T>> {
        let request = self.client.get(self.table_url(table)).query(query);
        let response = self.authorize(request).send().await?;
        read_rows(response).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[QueryPair],
    ) -> StoreResult<Option<T>> {
        let mut query = query.to_vec();
        query.push(("limit", "1".to_string()));
        let rows: Vec<T> = self.select(table, &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert<B, T>(&self, table: &str, body: &B) -> StoreResult<Vec<T>>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", PREFER_REPRESENTATION)
            .json(body);
        let response = self.authorize(request).send().await?;
        read_rows(response).await
    }

    async fn update<B, T>(&self, table: &str, query: &[QueryPair], body: &B) -> StoreResult<Vec<T>>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(query)
            .header("Prefer", PREFER_REPRESENTATION)
            .json(body);
        let response = self.authorize(request).send().await?;
        read_rows(response).await
    }

    async fn delete<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[QueryPair],
    ) -> StoreResult<Vec<T>> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(query)
            .header("Prefer", PREFER_REPRESENTATION);
        let response = self.authorize(request).send().await?;
        read_rows(response).await
    }
}

#[derive(Deserialize)]
struct UserIdRow {
    user_id: String,
}

#[derive(Deserialize)]
struct PositionRow {
    position: i64,
}

#[derive(Deserialize)]
struct CountRow {
    count: u64,
}

#[derive(Deserialize)]
struct ConversationWithCount {
    #[serde(flatten)]
    conversation: Conversation,
    #[serde(default)]
    quotes: Vec<CountRow>,
}

impl From<ConversationWithCount> for ConversationSummary {
    fn from(row: ConversationWithCount) -> Self {
        let quote_count = row.quotes.first().map_or(0, |count| count.count);
        Self {
            id: row.conversation.id,
            title: row.conversation.title,
            chatgpt_url: row.conversation.chatgpt_url,
            quote_count,
            created_at: row.conversation.created_at,
            updated_at: row.conversation.updated_at,
        }
    }
}

fn conversation_list_query(user_id: &str, search: Option<&str>, limit: u32) -> Vec<QueryPair> {
    let mut query = vec![
        ("select", "*,quotes(count)".to_string()),
        ("user_id", eq(user_id)),
        ("order", "updated_at.desc".to_string()),
        ("limit", limit.to_string()),
    ];
    if let Some(search) = search {
        query.push(("title", contains_ignore_case(search)));
    }
    query
}

fn quote_list_query(user_id: &str, filter: &QuoteFilter) -> Vec<QueryPair> {
    let mut query = vec![
        ("select", "*,conversations!inner(title,user_id)".to_string()),
        ("conversations.user_id", eq(user_id)),
        ("order", "created_at.desc".to_string()),
        ("limit", filter.limit.to_string()),
    ];
    if let Some(conversation_id) = filter.conversation_id.as_deref() {
        query.push(("conversation_id", eq(conversation_id)));
    }
    if let Some(column_id) = filter.column_id.as_deref() {
        query.push(("column_id", eq(column_id)));
    }
    if let Some(text) = filter.text.as_deref() {
        query.push(("text", contains_ignore_case(text)));
    }
    query
}

/// Row filter for a batched quote move, or `None` when nothing is selected.
fn move_quotes_query(selector: &QuoteSelector) -> Option<Vec<QueryPair>> {
    match selector {
        QuoteSelector::Ids {
            conversation_id,
            ids,
        } => {
            if ids.is_empty() {
                return None;
            }
            Some(vec![("id", in_list(ids)), ("conversation_id", eq(conversation_id))])
        }
        QuoteSelector::Column(source) => Some(vec![("column_id", eq(source))]),
    }
}

impl RefineryStore for SupabaseStore {
    async fn find_api_key_owner(&self, key: &str) -> StoreResult<Option<String>> {
        let row: Option<UserIdRow> = self
            .select_one(
                TABLE_API_KEYS,
                &[("select", "user_id".to_string()), ("key", eq(key))],
            )
            .await?;
        Ok(row.map(|row| row.user_id))
    }

    async fn touch_api_key(&self, key: &str, used_at: DateTime<Utc>) -> StoreResult<()> {
        let body = json!({ "last_used_at": used_at.to_rfc3339() });
        let _: Vec<Value> = self
            .update(TABLE_API_KEYS, &[("key", eq(key))], &body)
            .await?;
        Ok(())
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        search: Option<&str>,
        limit: u32,
    ) -> StoreResult<Vec<ConversationSummary>> {
        let query = conversation_list_query(user_id, search, limit);
        let rows: Vec<ConversationWithCount> = self.select(TABLE_CONVERSATIONS, &query).await?;
        Ok(rows.into_iter().map(ConversationSummary::from).collect())
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        self.select_one(
            TABLE_CONVERSATIONS,
            &[
                ("select", "*".to_string()),
                ("id", eq(conversation_id)),
                ("user_id", eq(user_id)),
            ],
        )
        .await
    }

    async fn list_columns(&self, conversation_id: &str) -> StoreResult<Vec<Column>> {
        self.select(
            TABLE_COLUMNS,
            &[
                ("select", "*".to_string()),
                ("conversation_id", eq(conversation_id)),
                ("order", "position.asc".to_string()),
            ],
        )
        .await
    }

    async fn get_column(&self, column_id: &str) -> StoreResult<Option<Column>> {
        self.select_one(
            TABLE_COLUMNS,
            &[("select", "*".to_string()), ("id", eq(column_id))],
        )
        .await
    }

    async fn max_column_position(&self, conversation_id: &str) -> StoreResult<Option<i64>> {
        let row: Option<PositionRow> = self
            .select_one(
                TABLE_COLUMNS,
                &[
                    ("select", "position".to_string()),
                    ("conversation_id", eq(conversation_id)),
                    ("order", "position.desc".to_string()),
                ],
            )
            .await?;
        Ok(row.map(|row| row.position))
    }

    async fn insert_column(&self, column: NewColumn) -> StoreResult<Column> {
        let rows: Vec<Column> = self.insert(TABLE_COLUMNS, &column).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {TABLE_COLUMNS} returned no rows")))
    }

    async fn update_column(
        &self,
        column_id: &str,
        patch: ColumnPatch,
    ) -> StoreResult<Option<Column>> {
        if patch == ColumnPatch::default() {
            return Err(StoreError::InvalidInput("column patch is empty".to_string()));
        }
        let rows: Vec<Column> = self
            .update(TABLE_COLUMNS, &[("id", eq(column_id))], &patch)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_column(&self, column_id: &str) -> StoreResult<bool> {
        let rows: Vec<Value> = self
            .delete(TABLE_COLUMNS, &[("id", eq(column_id))])
            .await?;
        Ok(!rows.is_empty())
    }

    async fn list_quotes(
        &self,
        user_id: &str,
        filter: &QuoteFilter,
    ) -> StoreResult<Vec<QuoteRecord>> {
        self.select(TABLE_QUOTES, &quote_list_query(user_id, filter))
            .await
    }

    async fn list_conversation_quotes(&self, conversation_id: &str) -> StoreResult<Vec<Quote>> {
        self.select(
            TABLE_QUOTES,
            &[
                ("select", "*".to_string()),
                ("conversation_id", eq(conversation_id)),
                ("order", "position.asc".to_string()),
            ],
        )
        .await
    }

    async fn get_quote(&self, quote_id: &str) -> StoreResult<Option<Quote>> {
        self.select_one(
            TABLE_QUOTES,
            &[("select", "*".to_string()), ("id", eq(quote_id))],
        )
        .await
    }

    async fn move_quotes(
        &self,
        selector: QuoteSelector,
        column_id: &str,
    ) -> StoreResult<Vec<Quote>> {
        let Some(query) = move_quotes_query(&selector) else {
            return Ok(Vec::new());
        };
        let body = json!({ "column_id": column_id });
        self.update(TABLE_QUOTES, &query, &body).await
    }

    async fn delete_quote(&self, quote_id: &str) -> StoreResult<bool> {
        let rows: Vec<Value> = self
            .delete(TABLE_QUOTES, &[("id", eq(quote_id))])
            .await?;
        Ok(!rows.is_empty())
    }

    async fn list_backups(&self, conversation_id: &str) -> StoreResult<Vec<BackupSummary>> {
        self.select(
            TABLE_BACKUPS,
            &[
                ("select", BACKUP_SUMMARY_COLUMNS.to_string()),
                ("conversation_id", eq(conversation_id)),
                ("order", "version.desc".to_string()),
            ],
        )
        .await
    }

    async fn get_backup(&self, backup_id: &str) -> StoreResult<Option<Backup>> {
        self.select_one(
            TABLE_BACKUPS,
            &[("select", "*".to_string()), ("id", eq(backup_id))],
        )
        .await
    }

    async fn download_blob(&self, path: &str) -> StoreResult<Vec<u8>> {
        let download_error = |message: String| StoreError::Download {
            path: path.to_string(),
            message,
        };
        let url = self
            .object_url(BUCKET_BACKUPS, path)
            .map_err(|err| download_error(err.to_string()))?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|err| download_error(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(download_error(format!(
                "{} (status {})",
                error_message(&body),
                status.as_u16()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| download_error(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

async fn read_rows<T: DeserializeOwned>(response: Response) -> StoreResult<Vec<T>> {
    let status = response.status();
    let body = response.bytes().await?;
    decode_rows(status, &body)
}

fn decode_rows<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> StoreResult<Vec<T>> {
    if !status.is_success() {
        return Err(StoreError::Api {
            status: status.as_u16(),
            message: error_message(&String::from_utf8_lossy(body)),
        });
    }
    serde_json::from_slice(body).map_err(|err| StoreError::Decode(err.to_string()))
}

/// Extracts the human readable message from a PostgREST or storage error body.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.error))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty error response".to_string()
            } else {
                trimmed.to_string()
            }
        })
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// Case-insensitive literal substring filter.
///
/// `ilike` cannot carry a literal `*` (PostgREST turns it into `%`), so the
/// fragment goes through `imatch` as an escaped regular expression instead.
fn contains_ignore_case(fragment: &str) -> String {
    format!("imatch.{}", regex::escape(fragment))
}

fn in_list(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|value| format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}
