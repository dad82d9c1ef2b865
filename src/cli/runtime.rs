use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_cli::config::{LogConfig, LogFormat, WardenConfig, DEFAULT_CONFIG_PATH};

use super::env::CliArgs;

pub fn init_logging(log: &LogConfig, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        log.level.parse().context("Invalid log level")?
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(())
}

pub struct LoadedConfig {
    pub config: WardenConfig,
    /// The file that contributed to `config`, if any.
    pub path: Option<PathBuf>,
}

pub fn load_config(cli: &CliArgs) -> Result<LoadedConfig> {
    let mut config = WardenConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }

    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|path| path.exists()),
    };
    Ok(LoadedConfig { config, path })
}
