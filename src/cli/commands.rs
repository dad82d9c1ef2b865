use clap::Subcommand;

use super::check::CheckArgs;
use super::config::ConfigArgs;
use super::notify::NotifyArgs;
use super::reload::ReloadArgs;
use super::serve::ServeArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run the cache, reload loops and analytics pipeline until Ctrl-C
    Serve(ServeArgs),

    /// Load the configured source once and print cache statistics
    Reload(ReloadArgs),

    /// Publish one invalidation notification to the cluster
    Notify(NotifyArgs),

    /// Decide a single request against the configured source
    Check(CheckArgs),

    /// Inspect and validate the effective configuration
    Config(ConfigArgs),

    /// Show build and configuration information
    Info,
}
