//! MCP server implementation for refinery.
//!
//! This crate wires the control plane into rmcp tool handlers. Every handler
//! runs on behalf of the user authenticated at startup.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use refinery_core::control::{RefineryControlPlane, UserContext};
use refinery_core::store::RefineryStore;
use rmcp::{ServerHandler, handler::server::tool::ToolRouter, tool_handler};
use rmcp::model::{Implementation, ServerCapabilities, ServerInfo};

pub use tools::{backups::*, columns::*, conversations::*, quotes::*};

const SERVER_NAME: &str = "refinery";

const SERVER_INSTRUCTIONS: &str = r"refinery exposes your saved ChatGPT conversations and the quotes you collected from them.

Model:
- A conversation has ordered columns (by `position`) and quotes; every quote sits in one column.
- Backups are versioned snapshots of a conversation's messages.

Workflow:
1. Find a conversation with `list_conversations` (optional `search` on the title).
2. Inspect it with `get_conversation`, or `list_columns` / `list_quotes` for narrower views.
3. Organize quotes with `create_column`, `rename_column`, `reorder_columns`, `move_quote`
   and `move_quotes_bulk`. `delete_column` moves its quotes to the first remaining column.
   Both move tools stay within one conversation; `move_quotes_bulk` skips and does not
   count ids from other conversations.
4. Use `search_quotes` for a case-insensitive text search across all conversations.
5. `list_backups` and `get_backup` return stored message history.

Notes:
- Only your own data is visible; ids belonging to anyone else are reported as not found.
- `reorder_columns` expects every column id of the conversation exactly once.";

/// MCP server wrapper around the control plane and tool routers.
pub struct RefineryMcp<S: RefineryStore> {
    tool_router: ToolRouter<Self>,
    control: RefineryControlPlane<S>,
    user: Arc<UserContext>,
}

impl<S: RefineryStore> Clone for RefineryMcp<S> {
    fn clone(&self) -> Self {
        Self {
            tool_router: self.tool_router.clone(),
            control: self.control.clone(),
            user: self.user.clone(),
        }
    }
}

impl<S: RefineryStore> RefineryMcp<S> {
    /// Creates a server acting as `user`.
    #[must_use]
    pub fn new(control: RefineryControlPlane<S>, user: UserContext) -> Self {
        let tool_router = Self::tool_router_conversations()
            + Self::tool_router_columns()
            + Self::tool_router_quotes()
            + Self::tool_router_backups();
        Self {
            tool_router,
            control,
            user: Arc::new(user),
        }
    }

    /// The user every tool call runs as.
    #[must_use]
    pub fn user(&self) -> &UserContext {
        &self.user
    }
}

#[tool_handler]
impl<S: RefineryStore> ServerHandler for RefineryMcp<S> {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name = SERVER_NAME.to_string();
        server_info.version = env!("CARGO_PKG_VERSION").to_string();
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info,
            ..Default::default()
        }
    }
}
