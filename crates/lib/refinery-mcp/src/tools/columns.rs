use refinery_core::store::RefineryStore;
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

/// Parameters for listing a conversation's columns.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListColumnsParams {
    /// Conversation ID
    pub conversation_id: String,
}

/// Parameters for creating a column.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CreateColumnParams {
    /// Conversation ID
    pub conversation_id: String,
    /// Column name
    pub name: String,
}

/// Parameters for renaming a column.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RenameColumnParams {
    /// Column ID
    pub column_id: String,
    /// New column name
    pub name: String,
}

/// Parameters for deleting a column.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DeleteColumnParams {
    /// Column ID
    pub column_id: String,
}

/// Parameters for reordering a conversation's columns.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReorderColumnsParams {
    /// Conversation ID
    pub conversation_id: String,
    /// Column IDs in desired order
    pub column_ids: Vec<String>,
}

#[tool_router(router = tool_router_columns, vis = "pub")]
impl<S: RefineryStore> RefineryMcp<S> {
    #[tool(description = "List columns for a conversation")]
    async fn list_columns(
        &self,
        Parameters(params): Parameters<ListColumnsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .list_columns(&self.user, &params.conversation_id)
            .await;
        helpers::respond("list_columns", outcome)
    }

    #[tool(description = "Create a new column in a conversation")]
    async fn create_column(
        &self,
        Parameters(params): Parameters<CreateColumnParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .create_column(&self.user, &params.conversation_id, &params.name)
            .await;
        helpers::respond("create_column", outcome)
    }

    #[tool(description = "Rename a column")]
    async fn rename_column(
        &self,
        Parameters(params): Parameters<RenameColumnParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .rename_column(&self.user, &params.column_id, &params.name)
            .await;
        helpers::respond("rename_column", outcome)
    }

    #[tool(description = "Delete a column (quotes will be moved to the first column)")]
    async fn delete_column(
        &self,
        Parameters(params): Parameters<DeleteColumnParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .delete_column(&self.user, &params.column_id)
            .await;
        helpers::respond("delete_column", outcome)
    }

    #[tool(description = "Reorder columns by providing column IDs in the desired order")]
    async fn reorder_columns(
        &self,
        Parameters(params): Parameters<ReorderColumnsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .reorder_columns(&self.user, &params.conversation_id, &params.column_ids)
            .await;
        helpers::respond("reorder_columns", outcome)
    }
}
