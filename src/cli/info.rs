use anyhow::Result;

use super::runtime::LoadedConfig;

pub fn cmd_info(loaded: &LoadedConfig) -> Result<()> {
    let config = &loaded.config;

    println!("Warden System Information");
    println!("=========================");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Build Date: {}", env!("BUILD_DATE"));
    println!("Git Commit: {}", env!("GIT_HASH"));
    println!(
        "Redis Support: {}",
        if cfg!(feature = "redis") { "compiled in" } else { "not compiled in" }
    );
    println!();

    println!("Configuration:");
    match &loaded.path {
        Some(path) => println!("- File: {}", path.display()),
        None => println!("- File: (none, defaults and environment)"),
    }
    match &config.cache.source {
        Some(source) => println!("- Cache Source: {}", source.display()),
        None => println!("- Cache Source: (empty in-memory store)"),
    }
    println!(
        "- Reload: tick={}ms backoff={}s periodic={}",
        config.reload.tick_ms,
        config.reload.resubscribe_backoff_secs,
        if config.reload.periodic_full_reload_secs == 0 {
            "off".to_string()
        } else {
            format!("{}s", config.reload.periodic_full_reload_secs)
        }
    );
    println!(
        "- Pub/Sub: {:?} on {} (signatures {})",
        config.pubsub.backend,
        config.pubsub.channel,
        if config.reload.verify_signatures { "verified" } else { "not verified" }
    );
    if config.analytics.enable {
        println!(
            "- Analytics: {:?} sink, {} workers, buffer {}, flush {}ms, {} encoding",
            config.analytics.sink,
            config.analytics.pool_size,
            config.analytics.records_buffer_size,
            config.analytics.flush_interval_ms,
            config.analytics.encoding
        );
    } else {
        println!("- Analytics: disabled");
    }
    if config.metrics.port == 0 {
        println!("- Metrics: disabled");
    } else {
        println!("- Metrics: http://0.0.0.0:{}/metrics", config.metrics.port);
    }

    let problems = config.validate();
    if !problems.is_empty() {
        println!();
        println!("Configuration Problems:");
        for problem in problems {
            println!("- {problem}");
        }
    }
    Ok(())
}
