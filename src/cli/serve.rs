use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::signal;
use tracing::info;
use warden_cli::metrics;
use warden_cli::{Warden, WardenConfig};

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Backing-store document, overrides cache.source
    #[arg(long, value_name = "FILE")]
    pub source: Option<PathBuf>,
}

pub async fn cmd_serve(args: ServeArgs, mut config: WardenConfig) -> Result<()> {
    if let Some(source) = args.source {
        config.cache.source = Some(source);
    }
    let metrics_port = config.metrics.port;
    let warden = Warden::build(config).context("Failed to build service")?;

    let metrics_server = metrics::spawn_metrics_server(metrics_port);
    match warden.start().await.context("Failed to start service")? {
        Some(stats) => info!(
            revision = stats.revision,
            secrets = stats.secrets,
            policies = stats.policies,
            "serving"
        ),
        None => info!("serving with an empty cache"),
    }

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    warden.shutdown().await;
    if let Some(server) = metrics_server {
        server.abort();
    }
    Ok(())
}
