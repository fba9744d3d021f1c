use refinery_core::store::RefineryStore;
use refinery_store::schema::DEFAULT_CONVERSATION_LIMIT;
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
    DEFAULT_CONVERSATION_LIMIT
}

/// Parameters for listing conversations.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListConversationsParams {
    /// Max number of conversations to return
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Search by title
    pub search: Option<String>,
}

/// Parameters for fetching a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetConversationParams {
    /// Conversation ID
    pub conversation_id: String,
}

#[tool_router(router = tool_router_conversations, vis = "pub")]
impl<S: RefineryStore> RefineryMcp<S> {
    #[tool(description = "List all conversations with their quote counts")]
    async fn list_conversations(
        &self,
        Parameters(params): Parameters<ListConversationsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .list_conversations(&self.user, params.search.as_deref(), params.limit)
            .await;
        helpers::respond("list_conversations", outcome)
    }

    #[tool(description = "Get a conversation with its columns and quotes")]
    async fn get_conversation(
        &self,
        Parameters(params): Parameters<GetConversationParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .control
            .get_conversation(&self.user, &params.conversation_id)
            .await;
        helpers::respond("get_conversation", outcome)
    }
}
