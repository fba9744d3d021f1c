use std::{error::Error, fmt, sync::Arc};

use refinery_store::models::{Column, Conversation, Quote};
use serde::{Deserialize, Serialize};

use crate::store::{RefineryStore, StoreError};

pub mod auth;
pub mod backups;
pub mod columns;
pub mod conversations;
pub mod quotes;

pub use auth::UserContext;

#[derive(Debug)]
pub enum ControlError {
    Store(StoreError),
    NotFound { kind: &'static str, id: String },
    InvalidInput(String),
    Conflict(String),
    Unauthenticated,
    InvalidBackup(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
            Self::Conflict(message) => write!(f, "{message}"),
            Self::Unauthenticated => write!(f, "Invalid API key"),
            Self::InvalidBackup(message) => {
                write!(f, "backup payload is not a message list: {message}")
            }
        }
    }
}

impl Error for ControlError {}

impl From<StoreError> for ControlError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl ControlError {
    fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result of a write that has nothing else to report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Acknowledgement {
    pub success: bool,
}

impl Acknowledgement {
    pub(crate) const OK: Self = Self { success: true };
}

/// Operation handlers over a store backend.
///
/// Every operation takes the caller's [`UserContext`]; rows reached by id are
/// resolved back to their conversation and rejected as not found unless that
/// conversation belongs to the caller.
pub struct RefineryControlPlane<S: RefineryStore> {
    store: Arc<S>,
}

impl<S: RefineryStore> Clone for RefineryControlPlane<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: RefineryStore> RefineryControlPlane<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub const fn from_arc(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn owned_conversation(
        &self,
        user: &UserContext,
        conversation_id: &str,
    ) -> Result<Conversation, ControlError> {
        let conversation_id = require_text(conversation_id, "conversation_id")?;
        self.store
            .get_conversation(user.user_id(), conversation_id)
            .await?
            .ok_or_else(|| ControlError::not_found("Conversation", conversation_id))
    }

    async fn owned_column(
        &self,
        user: &UserContext,
        column_id: &str,
    ) -> Result<Column, ControlError> {
        let column_id = require_text(column_id, "column_id")?;
        let column = self
            .store
            .get_column(column_id)
            .await?
            .ok_or_else(|| ControlError::not_found("Column", column_id))?;
        self.store
            .get_conversation(user.user_id(), &column.conversation_id)
            .await?
            .ok_or_else(|| ControlError::not_found("Column", column_id))?;
        Ok(column)
    }

    async fn owned_quote(&self, user: &UserContext, quote_id: &str) -> Result<Quote, ControlError> {
        let quote_id = require_text(quote_id, "quote_id")?;
        let quote = self
            .store
            .get_quote(quote_id)
            .await?
            .ok_or_else(|| ControlError::not_found("Quote", quote_id))?;
        self.store
            .get_conversation(user.user_id(), &quote.conversation_id)
            .await?
            .ok_or_else(|| ControlError::not_found("Quote", quote_id))?;
        Ok(quote)
    }
}

fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str, ControlError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ControlError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed)
}

fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
