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

/// Parameters for listing a conversation's backups.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListBackupsParams {
    /// Conversation ID
    pub conversation_id: String,
}

/// Parameters for fetching one backup.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetBackupParams {
    /// Backup ID
    pub backup_id: String,
}

#[tool_router(router = tool_router_backups, vis = "pub")]
impl<S: RefineryStore> RefineryMcp<S> {
    #[tool(description = "List conversation backups/versions")]
    async fn list_backups(
        &self,
        Parameters(params): Parameters<ListBackupsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .list_backups(&self.user, &params.conversation_id)
            .await;
        helpers::respond("list_backups", outcome)
    }

    #[tool(description = "Get a specific backup with all messages")]
    async fn get_backup(
        &self,
        Parameters(params): Parameters<GetBackupParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self.control.get_backup(&self.user, &params.backup_id).await;
        helpers::respond("get_backup", outcome)
    }
}
