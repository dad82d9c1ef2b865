use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    // Logging settings live in the config file, so it is read first.
    let loaded = load_config(&cli)?;
    init_logging(&loaded.config.log, cli.debug)?;

    info!("Starting Warden v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &loaded.path {
        info!(path = %path.display(), "loaded configuration");
    }

    match dispatch(&cli, &loaded).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
