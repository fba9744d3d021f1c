use refinery_store::models::{ConversationDetail, ConversationSummary};
use refinery_store::schema::DEFAULT_CONVERSATION_LIMIT;

use crate::store::RefineryStore;

use super::{ControlError, RefineryControlPlane, UserContext, normalize_optional};

impl<S: RefineryStore> RefineryControlPlane<S> {
    /// Lists the caller's conversations with quote counts, most recently
    /// updated first. A zero limit falls back to the default of 50.
    ///
    /// # Errors
    /// Returns `ControlError` if the store query fails.
    pub async fn list_conversations(
        &self,
        user: &UserContext,
        search: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ConversationSummary>, ControlError> {
        let limit = if limit == 0 {
            DEFAULT_CONVERSATION_LIMIT
        } else {
            limit
        };
        let search = normalize_optional(search);
        Ok(self
            .store
            .list_conversations(user.user_id(), search.as_deref(), limit)
            .await?)
    }

    /// Fetches a conversation with its columns and quotes.
    ///
    /// # Errors
    /// Returns `ControlError::NotFound` if the conversation does not exist or
    /// belongs to another user.
    pub async fn get_conversation(
        &self,
        user: &UserContext,
        conversation_id: &str,
    ) -> Result<ConversationDetail, ControlError> {
        let conversation = self.owned_conversation(user, conversation_id).await?;
        let columns = self.store.list_columns(&conversation.id).await?;
        let quotes = self.store.list_conversation_quotes(&conversation.id).await?;
        Ok(ConversationDetail {
            conversation,
            columns,
            quotes,
        })
    }
}
