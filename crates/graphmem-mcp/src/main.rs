//! graphmem MCP server binary.
//!
//! Serves the memory tools over the stdio transport. Logs go to stderr since
//! stdout carries the protocol.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use graphmem_core::{EpisodeQueue, GraphMemory};
use graphmem_drivers::DriverFactory;
use graphmem_mcp::{Cli, GraphMemServer};

/// How long queued episodes get to finish once the client disconnects.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // stdout is the MCP transport
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(cli.load_config()?);

    tracing::info!(
        provider = %config.database.provider,
        target = %config.database.display_target(),
        group_id = %config.group_id,
        custom_entities = config.use_custom_entities,
        "Starting graphmem MCP server"
    );

    let driver = DriverFactory::create(&config.database).await?;
    let memory = Arc::new(GraphMemory::without_extraction(Arc::clone(&driver)));

    if config.destroy_graph {
        tracing::warn!("Destroying graph on startup");
        memory.clear().await?;
    }

    let started = Instant::now();
    memory.build_indices().await?;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Graph indices ready"
    );

    let queue = EpisodeQueue::new(&config.queue);
    let server = GraphMemServer::new(memory, queue.clone(), Arc::clone(&config));

    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("Server error: {:?}", e);
    })?;

    tracing::info!("MCP server running on stdio");

    service.waiting().await?;

    if tokio::time::timeout(DRAIN_TIMEOUT, queue.drain()).await.is_err() {
        tracing::warn!(
            active_workers = queue.active_workers(),
            "Episode queue did not drain in time, cancelling remaining work"
        );
    }
    queue.shutdown().await;
    driver.close().await?;

    tracing::info!("graphmem MCP server stopped");
    Ok(())
}
