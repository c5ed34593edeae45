//! harrier - Entry point.
//!
//! Builds the full system from configuration, keeps it running until
//! interrupted, then tears it down.

use std::borrow::Cow;

use anyhow::{Context, Result};
use tracing::info;

use harrier::config::Config;
use harrier::system::System;

async fn run() -> Result<()> {
    let config_path = std::env::var("CONFIG_PATH")
        .map(Cow::Owned)
        .unwrap_or(Cow::Borrowed("config.toml"));
    let config = match Config::load(config_path.as_ref()) {
        Ok(config) => config,
        Err(err) if !std::path::Path::new(config_path.as_ref()).exists() => {
            info!("no config file at {config_path}, using defaults ({err})");
            Config::default()
        }
        Err(err) => return Err(err).context("Failed to load configuration"),
    };

    // Initialize metrics (must be done early, before any metrics are recorded)
    harrier::metrics::init(&config.metrics).context("Failed to initialize metrics")?;
    if config.metrics.enabled {
        info!("Metrics enabled on {}", config.metrics.listen);
    }

    info!("Starting harrier...");
    let system = System::build(config)
        .await
        .context("Failed to build the system")?;

    info!(
        "Resolver pool composed with {} primary resolvers (trust level {})",
        system.pool().num_resolvers(),
        system.pool().trust_level()
    );
    info!("ASN cache holds {} netblocks", system.cache().len());
    for graph in system.graphs() {
        info!("Graph backend ready: {}", graph.describe());
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")?;
    info!("Ctrl-C received, shutting down...");

    system.shutdown().await.context("Shutdown failed")?;
    info!(
        "Shutdown complete ({} bytes resident at exit)",
        system.memory_usage()
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    run().await
}
