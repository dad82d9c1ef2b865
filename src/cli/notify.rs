use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use tracing::warn;
use warden_cli::config::Backend;
use warden_cli::{Warden, WardenConfig};
use warden_reload::Notification;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum NotifyKind {
    Policy,
    Secret,
}

#[derive(Args, Clone)]
pub struct NotifyArgs {
    /// What changed
    #[arg(value_enum)]
    pub kind: NotifyKind,

    /// Free-form payload, usually the subject or secret id
    #[arg(default_value = "")]
    pub payload: String,
}

pub async fn cmd_notify(args: NotifyArgs, mut config: WardenConfig) -> Result<()> {
    if config.pubsub.backend == Backend::Memory {
        warn!("pubsub.backend is memory; the notification stays inside this process");
    }
    config.analytics.enable = false;
    let warden = Warden::build(config).context("Failed to build service")?;

    let notification = match args.kind {
        NotifyKind::Policy => Notification::policy_changed(args.payload),
        NotifyKind::Secret => Notification::secret_changed(args.payload),
    };
    let command = notification.command.clone();
    if !warden.bus().notify(notification).await {
        bail!("notification {} was not published", command);
    }
    println!("Published {} on {}", command, warden.bus().channel());
    Ok(())
}
