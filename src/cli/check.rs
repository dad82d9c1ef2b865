use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use warden_cli::{AccessRequest, Warden, WardenConfig};
use warden_policy_cache::PolicyCache;

use super::output::{emit, OutputFormat};

#[derive(Args, Clone)]
pub struct CheckArgs {
    pub subject: String,
    pub action: String,
    pub resource: String,

    /// Backing-store document, overrides cache.source
    #[arg(long, value_name = "FILE")]
    pub source: Option<PathBuf>,
}

pub async fn cmd_check(args: CheckArgs, mut config: WardenConfig, output: OutputFormat) -> Result<()> {
    if let Some(source) = args.source {
        config.cache.source = Some(source);
    }
    config.analytics.enable = false;
    let warden = Warden::build(config).context("Failed to build service")?;
    warden.cache().reload().await.context("Reload failed")?;

    let request = AccessRequest::new(args.subject, args.action, args.resource);
    let decision = warden.authorizer().authorize(&request);
    emit(output, &decision, |decision| {
        println!("{}: {}", decision.effect, decision.conclusion);
        if !decision.deciders.is_empty() {
            println!("- Decided by: {}", decision.deciders.join(", "));
        }
    })
}
