use std::collections::HashSet;

use refinery_store::models::{Quote, QuoteFilter, QuoteRecord, QuoteSelector};
use refinery_store::schema::{DEFAULT_QUOTE_LIMIT, SEARCH_QUOTE_LIMIT};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::RefineryStore;

use super::{
    Acknowledgement,
    ControlError,
    RefineryControlPlane,
    UserContext,
    normalize_optional,
    require_text,
};

/// Outcome of a bulk move.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkMove {
    /// Quotes actually updated. Unknown ids and ids of quotes outside the
    /// target column's conversation, including the caller's own, are not
    /// counted.
    pub moved: usize,
}

impl<S: RefineryStore> RefineryControlPlane<S> {
    /// Lists the caller's quotes, newest first, optionally narrowed to a
    /// conversation and/or a column. A zero limit falls back to 100.
    ///
    /// # Errors
    /// Returns `ControlError` if the store query fails.
    pub async fn list_quotes(
        &self,
        user: &UserContext,
        conversation_id: Option<&str>,
        column_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<QuoteRecord>, ControlError> {
        let filter = QuoteFilter {
            conversation_id: normalize_optional(conversation_id),
            column_id: normalize_optional(column_id),
            text: None,
            limit: if limit == 0 { DEFAULT_QUOTE_LIMIT } else { limit },
        };
        Ok(self.store.list_quotes(user.user_id(), &filter).await?)
    }

    /// Case-insensitive substring search over the caller's quotes, newest
    /// first, capped at 50 results.
    ///
    /// # Errors
    /// Returns `ControlError::InvalidInput` for a blank query, or the store
    /// error.
    pub async fn search_quotes(
        &self,
        user: &UserContext,
        query: &str,
        conversation_id: Option<&str>,
    ) -> Result<Vec<QuoteRecord>, ControlError> {
        let query = require_text(query, "query")?;
        let filter = QuoteFilter {
            conversation_id: normalize_optional(conversation_id),
            column_id: None,
            text: Some(query.to_string()),
            limit: SEARCH_QUOTE_LIMIT,
        };
        Ok(self.store.list_quotes(user.user_id(), &filter).await?)
    }

    /// Moves one quote to another column of its conversation.
    ///
    /// # Errors
    /// Returns `ControlError::NotFound` if the quote or column is not the
    /// caller's, or `ControlError::InvalidInput` if the column belongs to a
    /// different conversation.
    pub async fn move_quote(
        &self,
        user: &UserContext,
        quote_id: &str,
        column_id: &str,
    ) -> Result<Quote, ControlError> {
        let quote = self.owned_quote(user, quote_id).await?;
        let column = self.owned_column(user, column_id).await?;
        if column.conversation_id != quote.conversation_id {
            return Err(ControlError::InvalidInput(format!(
                "column {} belongs to a different conversation than quote {}",
                column.id, quote.id
            )));
        }

        let selector = QuoteSelector::Ids {
            conversation_id: quote.conversation_id.clone(),
            ids: vec![quote.id.clone()],
        };
        self.store
            .move_quotes(selector, &column.id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ControlError::not_found("Quote", &quote.id))
    }

    /// Moves several quotes to a column in one batched update.
    ///
    /// Only quotes in the target column's conversation are moved. Other ids,
    /// whether unknown, foreign, or the caller's quotes in another
    /// conversation, are skipped rather than failing the call and are not
    /// counted in `moved`.
    ///
    /// # Errors
    /// Returns `ControlError::NotFound` if the column is not the caller's, or
    /// the store error.
    pub async fn move_quotes_bulk(
        &self,
        user: &UserContext,
        quote_ids: &[String],
        column_id: &str,
    ) -> Result<BulkMove, ControlError> {
        let column = self.owned_column(user, column_id).await?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = quote_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Ok(BulkMove { moved: 0 });
        }

        let requested = ids.len();
        let moved = self
            .store
            .move_quotes(
                QuoteSelector::Ids {
                    conversation_id: column.conversation_id.clone(),
                    ids,
                },
                &column.id,
            )
            .await?
            .len();
        debug!(column_id = %column.id, requested, moved, "bulk moved quotes");
        Ok(BulkMove { moved })
    }

    /// Deletes a quote.
    ///
    /// # Errors
    /// Returns `ControlError::NotFound` if the quote is not the caller's.
    pub async fn delete_quote(
        &self,
        user: &UserContext,
        quote_id: &str,
    ) -> Result<Acknowledgement, ControlError> {
        let quote = self.owned_quote(user, quote_id).await?;
        if !self.store.delete_quote(&quote.id).await? {
            return Err(ControlError::not_found("Quote", &quote.id));
        }
        Ok(Acknowledgement::OK)
    }
}
