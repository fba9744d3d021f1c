//! MCP server runner for refinery.

use refinery_core::control::{RefineryControlPlane, UserContext};
use refinery_core::store::RefineryStore;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use tracing::info;

use crate::RefineryMcp;

/// Serves the MCP server over stdio until the client disconnects.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio<S: RefineryStore>(
    control: RefineryControlPlane<S>,
    user: UserContext,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = RefineryMcp::new(control, user);
    let (stdin, stdout) = stdio();
    let running = serve_server(service, (stdin, stdout)).await?;
    info!("refinery MCP server running on stdio");
    let reason = running.waiting().await?;
    info!(?reason, "refinery MCP server stopped");
    Ok(())
}
