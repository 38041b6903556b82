//! store-finder MCP server entry point.
//!
//! Boots the cache agent, runs its install and activate events, then serves
//! it over the stdio transport. Logging goes to stderr to avoid interfering
//! with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use store_finder_client::{AgentConfig, CacheAgent, FetchClient, FetchConfig};
use store_finder_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(
        origin = %config.origin,
        db_path = %config.db_path.display(),
        "Starting store-finder server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache database at {}", config.db_path.display()))?;
    let client = FetchClient::new(FetchConfig::from(&config))?;
    let agent = Arc::new(CacheAgent::new(AgentConfig::from_app(&config)?, Arc::new(db), Arc::new(client)));

    let installed = agent.on_install().await?;
    if let Some(error) = &installed.error {
        tracing::warn!(error = %error, "starting with an incomplete precache");
    }
    let activated = agent.on_activate().await?;
    tracing::info!(deleted = ?activated.deleted, "cache agent ready");

    let handler = handler::StoreFinderServer::new(Arc::clone(&agent));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    agent.tasks().settle().await;
    tracing::info!("store-finder server stopped");

    Ok(())
}
