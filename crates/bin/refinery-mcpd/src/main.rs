//! Daemon entry point for the refinery MCP server.
//!
//! Loads configuration from flags and the environment, authenticates the API
//! key against the backend, and serves the MCP protocol over stdio.

mod config;

use std::process::ExitCode;

use refinery_core::control::RefineryControlPlane;
use refinery_core::store::SupabaseStore;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::config::RefineryConfig;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries protocol frames only.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = RefineryConfig::from_args()?;
    let store = SupabaseStore::new(&config.supabase_url, config.service_key.clone());
    let control = RefineryControlPlane::new(store);
    let user = control.authenticate(&config.api_key).await?;

    refinery_mcp::server::serve_stdio(control, user).await
}
