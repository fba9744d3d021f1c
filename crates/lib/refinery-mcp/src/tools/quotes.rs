use refinery_core::store::RefineryStore;
use refinery_store::schema::DEFAULT_QUOTE_LIMIT;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::{RefineryMcp, helpers};

const fn default_limit() -> u32 {
    DEFAULT_QUOTE_LIMIT
}

/// Parameters for listing quotes.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListQuotesParams {
    /// Filter by conversation
    pub conversation_id: Option<String>,
    /// Filter by column
    pub column_id: Option<String>,
    /// Max number of quotes
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// Parameters for searching quotes by text.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchQuotesParams {
    /// Search query
    pub query: String,
    /// Optionally limit to a conversation
    pub conversation_id: Option<String>,
}

/// Parameters for moving one quote.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MoveQuoteParams {
    /// Quote ID
    pub quote_id: String,
    /// Target column ID
    pub column_id: String,
}

/// Parameters for moving several quotes at once.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MoveQuotesBulkParams {
    /// Quote IDs to move
    pub quote_ids: Vec<String>,
    /// Target column ID
    pub column_id: String,
}

/// Parameters for deleting a quote.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DeleteQuoteParams {
    /// Quote ID
    pub quote_id: String,
}

#[tool_router(router = tool_router_quotes, vis = "pub")]
impl<S: RefineryStore> RefineryMcp<S> {
    #[tool(description = "List quotes with optional filters")]
    async fn list_quotes(
        &self,
        Parameters(params): Parameters<ListQuotesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .list_quotes(
                &self.user,
                params.conversation_id.as_deref(),
                params.column_id.as_deref(),
                params.limit,
            )
            .await;
        helpers::respond("list_quotes", outcome)
    }

    #[tool(description = "Search quotes by text content")]
    async fn search_quotes(
        &self,
        Parameters(params): Parameters<SearchQuotesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .search_quotes(&self.user, &params.query, params.conversation_id.as_deref())
            .await;
        helpers::respond("search_quotes", outcome)
    }

    #[tool(description = "Move a quote to a different column")]
    async fn move_quote(
        &self,
        Parameters(params): Parameters<MoveQuoteParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .move_quote(&self.user, &params.quote_id, &params.column_id)
            .await;
        helpers::respond("move_quote", outcome)
    }

    #[tool(
        description = "Move multiple quotes to a column at once (only quotes from the column's conversation are moved and counted)"
    )]
    async fn move_quotes_bulk(
        &self,
        Parameters(params): Parameters<MoveQuotesBulkParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .move_quotes_bulk(&self.user, &params.quote_ids, &params.column_id)
            .await;
        helpers::respond("move_quotes_bulk", outcome)
    }

    #[tool(description = "Delete a quote")]
    async fn delete_quote(
        &self,
        Parameters(params): Parameters<DeleteQuoteParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self.control.delete_quote(&self.user, &params.quote_id).await;
        helpers::respond("delete_quote", outcome)
    }
}
