use super::check::cmd_check;
use super::config::cmd_config;
use super::env::CliArgs;
use super::info::cmd_info;
use super::notify::cmd_notify;
use super::reload::cmd_reload;
use super::runtime::LoadedConfig;
use super::serve::cmd_serve;
use crate::cli::commands::Commands;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, loaded: &LoadedConfig) -> Result<()> {
    let config = loaded.config.clone();
    match cli.command.clone() {
        Commands::Serve(args) => cmd_serve(args, config).await,
        Commands::Reload(args) => cmd_reload(args, config, cli.output).await,
        Commands::Notify(args) => cmd_notify(args, config).await,
        Commands::Check(args) => cmd_check(args, config, cli.output).await,
        Commands::Config(args) => cmd_config(args, loaded, cli.output),
        Commands::Info => cmd_info(loaded),
    }
}
