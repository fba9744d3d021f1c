//! MCP tool modules.
//!
//! Tools are grouped by the rows they act on: conversations, columns, quotes
//! and backups.

pub mod backups;
pub mod columns;
pub mod conversations;
pub mod quotes;
