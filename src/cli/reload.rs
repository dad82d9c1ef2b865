use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use warden_cli::{Warden, WardenConfig};
use warden_policy_cache::PolicyCache;

use super::output::{emit, OutputFormat};

#[derive(Args, Clone)]
pub struct ReloadArgs {
    /// Backing-store document, overrides cache.source
    #[arg(long, value_name = "FILE")]
    pub source: Option<PathBuf>,
}

pub async fn cmd_reload(args: ReloadArgs, mut config: WardenConfig, output: OutputFormat) -> Result<()> {
    if let Some(source) = args.source {
        config.cache.source = Some(source);
    }
    config.analytics.enable = false;
    let warden = Warden::build(config).context("Failed to build service")?;
    let stats = warden.cache().reload().await.context("Reload failed")?;

    emit(output, &stats, |stats| {
        println!("Cache reloaded");
        println!("- Revision: {}", stats.revision);
        println!("- Secrets: {}", stats.secrets);
        println!("- Subjects: {}", stats.subjects);
        println!("- Policies: {}", stats.policies);
        if let Some(loaded_at) = stats.loaded_at {
            println!("- Loaded at: {}", loaded_at.to_rfc3339());
        }
    })
}
