use std::collections::{HashMap, HashSet};

use refinery_store::models::{Column, ColumnPatch, NewColumn, Quote, QuoteSelector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::RefineryStore;

use super::{Acknowledgement, ControlError, RefineryControlPlane, UserContext, require_text};

/// Outcome of deleting a column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDeletion {
    pub success: bool,
    /// Quotes reassigned away from the deleted column.
    pub moved_quotes: usize,
    /// Column that received the reassigned quotes, if the conversation had one.
    pub target_column_id: Option<String>,
}

impl<S: RefineryStore> RefineryControlPlane<S> {
    /// Lists a conversation's columns by position.
    ///
    /// # Errors
    /// Returns `ControlError::NotFound` if the conversation is not the caller's.
    pub async fn list_columns(
        &self,
        user: &UserContext,
        conversation_id: &str,
    ) -> Result<Vec<Column>, ControlError> {
        let conversation = self.owned_conversation(user, conversation_id).await?;
        Ok(self.store.list_columns(&conversation.id).await?)
    }

    /// Appends a column after the conversation's current last position.
    ///
    /// The position is read then written in two calls; concurrent creators in
    /// the same conversation can collide.
    ///
    /// # Errors
    /// Returns `ControlError` if the name is blank, the conversation is not the
    /// caller's, or the insert fails.
    pub async fn create_column(
        &self,
        user: &UserContext,
        conversation_id: &str,
        name: &str,
    ) -> Result<Column, ControlError> {
        let name = require_text(name, "name")?;
        let conversation = self.owned_conversation(user, conversation_id).await?;
        let position = self
            .store
            .max_column_position(&conversation.id)
            .await?
            .map_or(0, |max| max + 1);

        let column = self
            .store
            .insert_column(NewColumn {
                conversation_id: conversation.id,
                name: name.to_string(),
                position,
            })
            .await?;
        debug!(column_id = %column.id, position, "created column");
        Ok(column)
    }

    /// Renames a column.
    ///
    /// # Errors
    /// Returns `ControlError` if the name is blank or the column is not the
    /// caller's.
    pub async fn rename_column(
        &self,
        user: &UserContext,
        column_id: &str,
        name: &str,
    ) -> Result<Column, ControlError> {
        let name = require_text(name, "name")?;
        let column = self.owned_column(user, column_id).await?;
        self.store
            .update_column(&column.id, ColumnPatch::rename(name))
            .await?
            .ok_or_else(|| ControlError::not_found("Column", &column.id))
    }

    /// Deletes a column after moving its quotes to the lowest-positioned
    /// sibling.
    ///
    /// The last column of a conversation can only be deleted once no quote
    /// references it. If the delete fails after quotes were moved, they are
    /// moved back before the error is returned.
    ///
    /// # Errors
    /// Returns `ControlError::Conflict` when quotes would be left without a
    /// column, `ControlError::NotFound` if the column is not the caller's, or
    /// the underlying store error.
    pub async fn delete_column(
        &self,
        user: &UserContext,
        column_id: &str,
    ) -> Result<ColumnDeletion, ControlError> {
        let column = self.owned_column(user, column_id).await?;
        let target = self
            .store
            .list_columns(&column.conversation_id)
            .await?
            .into_iter()
            .find(|sibling| sibling.id != column.id);

        let moved = if let Some(target) = target.as_ref() {
            self.store
                .move_quotes(QuoteSelector::Column(column.id.clone()), &target.id)
                .await?
        } else {
            let stranded = self
                .store
                .list_conversation_quotes(&column.conversation_id)
                .await?
                .iter()
                .filter(|quote| quote.column_id.as_deref() == Some(column.id.as_str()))
                .count();
            if stranded > 0 {
                return Err(ControlError::Conflict(format!(
                    "Cannot delete the last column of a conversation while {stranded} quote(s) still reference it"
                )));
            }
            Vec::new()
        };

        match self.store.delete_column(&column.id).await {
            Ok(deleted) => {
                if !deleted {
                    debug!(column_id = %column.id, "column was already gone at delete time");
                }
            }
            Err(err) => {
                self.restore_quotes(&column, &moved).await;
                return Err(err.into());
            }
        }

        debug!(
            column_id = %column.id,
            moved_quotes = moved.len(),
            "deleted column"
        );
        Ok(ColumnDeletion {
            success: true,
            moved_quotes: moved.len(),
            target_column_id: target.map(|target| target.id),
        })
    }

    /// Sets each column's position to its index in `column_ids`.
    ///
    /// `column_ids` must list every column of the conversation exactly once.
    /// Updates are applied one by one; if one fails, the columns already
    /// updated are put back at their previous positions.
    ///
    /// # Errors
    /// Returns `ControlError::InvalidInput` if `column_ids` is not a
    /// permutation of the conversation's columns, or the store error that
    /// interrupted the reorder.
    pub async fn reorder_columns(
        &self,
        user: &UserContext,
        conversation_id: &str,
        column_ids: &[String],
    ) -> Result<Acknowledgement, ControlError> {
        let conversation = self.owned_conversation(user, conversation_id).await?;
        let columns = self.store.list_columns(&conversation.id).await?;
        validate_permutation(&columns, column_ids)?;

        let previous: HashMap<&str, i64> = columns
            .iter()
            .map(|column| (column.id.as_str(), column.position))
            .collect();
        let mut applied: Vec<&str> = Vec::with_capacity(column_ids.len());

        for (index, column_id) in column_ids.iter().enumerate() {
            let position = i64::try_from(index)
                .map_err(|_| ControlError::InvalidInput("too many columns".to_string()))?;
            if previous.get(column_id.as_str()) == Some(&position) {
                continue;
            }
            let outcome = self
                .store
                .update_column(column_id, ColumnPatch::reposition(position))
                .await;
            match outcome {
                Ok(Some(_)) => applied.push(column_id.as_str()),
                Ok(None) => {
                    self.restore_positions(&applied, &previous).await;
                    return Err(ControlError::not_found("Column", column_id));
                }
                Err(err) => {
                    self.restore_positions(&applied, &previous).await;
                    return Err(err.into());
                }
            }
        }

        debug!(conversation_id = %conversation.id, "reordered columns");
        Ok(Acknowledgement::OK)
    }

    async fn restore_quotes(&self, column: &Column, moved: &[Quote]) {
        if moved.is_empty() {
            return;
        }
        let ids = moved.iter().map(|quote| quote.id.clone()).collect();
        let selector = QuoteSelector::Ids {
            conversation_id: column.conversation_id.clone(),
            ids,
        };
        if let Err(err) = self.store.move_quotes(selector, &column.id).await {
            warn!(
                column_id = %column.id,
                "failed to move {} quote(s) back after a failed column delete: {err}",
                moved.len()
            );
        }
    }

    async fn restore_positions(&self, applied: &[&str], previous: &HashMap<&str, i64>) {
        for column_id in applied {
            let Some(position) = previous.get(column_id) else {
                continue;
            };
            if let Err(err) = self
                .store
                .update_column(column_id, ColumnPatch::reposition(*position))
                .await
            {
                warn!(
                    column_id = %column_id,
                    "failed to restore column position after a failed reorder: {err}"
                );
            }
        }
    }
}

fn validate_permutation(columns: &[Column], column_ids: &[String]) -> Result<(), ControlError> {
    let known: HashSet<&str> = columns.iter().map(|column| column.id.as_str()).collect();
    let mut seen = HashSet::with_capacity(column_ids.len());
    for column_id in column_ids {
        if !known.contains(column_id.as_str()) {
            return Err(ControlError::InvalidInput(format!(
                "column {column_id} does not belong to this conversation"
            )));
        }
        if !seen.insert(column_id.as_str()) {
            return Err(ControlError::InvalidInput(format!(
                "column {column_id} is listed more than once"
            )));
        }
    }
    if seen.len() != known.len() {
        return Err(ControlError::InvalidInput(format!(
            "column_ids must list all {} columns of the conversation, got {}",
            known.len(),
            seen.len()
        )));
    }
    Ok(())
}
