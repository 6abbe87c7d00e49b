//! itemmeta server entry point.
//!
//! Boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use itemmeta_client::{FetchClient, FetchConfig, ImageResolver, MetadataScraper, Resolver, TextEnhancer};
use itemmeta_core::{AppConfig, CacheDb, RateLimiter};

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = Arc::new(AppConfig::load()?);
    tracing::info!(
        db_path = %config.db_path.display(),
        environment = %config.environment,
        "starting itemmeta server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(config.as_ref()))?);

    let resolver = Resolver::new(
        db,
        Arc::new(MetadataScraper::new(fetcher.clone())),
        Arc::new(ImageResolver::from_fetcher(fetcher)),
        TextEnhancer::from_config(&config),
    )
    .configured(&config);

    let limiter = RateLimiter::from_config(&config);
    let handler = handler::ItemMetaServer::new(config, Arc::new(resolver), limiter);

    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    Ok(())
}
