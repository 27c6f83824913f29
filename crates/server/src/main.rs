//! swcache server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchClient, FetchConfig, Network, Registration};
use swcache_core::{AppConfig, CacheDb, CacheStorage, MemoryStorage};
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

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, origin = %config.origin, "Starting swcache server on stdio transport");

    let storage: Arc<dyn CacheStorage> = if config.ephemeral {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(CacheDb::open(&config.db_path).await?)
    };
    let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let registration = Arc::new(Registration::new(config, storage, network.clone()));

    if let Err(e) = registration.register(None).await {
        tracing::warn!(error = %e, "initial registration failed; call sw_register once the origin is reachable");
    }

    let handler = handler::SwCacheServer::new(registration, network);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
