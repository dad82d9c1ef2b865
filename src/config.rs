//! Layered service configuration.
//!
//! Built-in defaults, then an optional YAML file, then `WARDEN__` prefixed
//! environment variables (`WARDEN__ANALYTICS__POOL_SIZE=8`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_analytics::{AnalyticsFilters, AnalyticsOptions, RecordEncoding};
use warden_policy_cache::CacheOptions;
use warden_reload::{BusOptions, ReloadOptions, DEFAULT_CHANNEL};

use crate::errors::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/warden.yaml";
pub const ENV_PREFIX: &str = "WARDEN";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub log: LogConfig,
    pub cache: CacheConfig,
    pub reload: ReloadConfig,
    pub pubsub: PubSubConfig,
    pub analytics: AnalyticsConfig,
    pub metrics: MetricsConfig,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// YAML or JSON document holding secrets and policies.
    pub source: Option<PathBuf>,
    pub fetch_attempts: usize,
    pub retry_delay_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            source: None,
            fetch_attempts: 3,
            retry_delay_ms: 100,
        }
    }
}

impl CacheConfig {
    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            fetch_attempts: self.fetch_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub tick_ms: u64,
    pub resubscribe_backoff_secs: u64,
    /// Zero disables the periodic reload.
    pub periodic_full_reload_secs: u64,
    pub verify_signatures: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            resubscribe_backoff_secs: 10,
            periodic_full_reload_secs: 0,
            verify_signatures: true,
        }
    }
}

impl ReloadConfig {
    pub fn options(&self) -> ReloadOptions {
        ReloadOptions {
            tick: Duration::from_millis(self.tick_ms),
            resubscribe_backoff: Duration::from_secs(self.resubscribe_backoff_secs),
            periodic_full_reload: (self.periodic_full_reload_secs > 0)
                .then(|| Duration::from_secs(self.periodic_full_reload_secs)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Redis,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubConfig {
    pub backend: Backend,
    pub url: Option<String>,
    pub channel: String,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            url: None,
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

impl PubSubConfig {
    pub fn bus_options(&self, reload: &ReloadConfig) -> BusOptions {
        BusOptions {
            channel: self.channel.clone(),
            verify_signatures: reload.verify_signatures,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enable: bool,
    pub pool_size: usize,
    pub records_buffer_size: usize,
    pub flush_interval_ms: u64,
    /// Humantime duration such as `24h`; `0s` keeps records for a century.
    pub storage_expiration: String,
    pub enable_detailed_recording: bool,
    pub encoding: RecordEncoding,
    pub sink: Backend,
    pub sink_url: Option<String>,
    pub key_prefix: String,
    pub filters: AnalyticsFilters,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enable: true,
            pool_size: 50,
            records_buffer_size: 1000,
            flush_interval_ms: 200,
            storage_expiration: "24h".to_string(),
            enable_detailed_recording: true,
            encoding: RecordEncoding::Bincode,
            sink: Backend::Memory,
            sink_url: None,
            key_prefix: "analytics-".to_string(),
            filters: AnalyticsFilters::default(),
        }
    }
}

impl AnalyticsConfig {
    pub fn storage_expiration(&self) -> Result<Duration, ConfigError> {
        humantime::parse_duration(self.storage_expiration.trim()).map_err(|err| {
            ConfigError::Invalid(vec![format!(
                "analytics.storage_expiration {:?}: {err}",
                self.storage_expiration
            )])
        })
    }

    pub fn options(&self) -> Result<AnalyticsOptions, ConfigError> {
        Ok(AnalyticsOptions {
            enable: self.enable,
            pool_size: self.pool_size,
            records_buffer_size: self.records_buffer_size,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            storage_expiration: self.storage_expiration()?,
            enable_detailed_recording: self.enable_detailed_recording,
            encoding: self.encoding,
            filters: self.filters.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Zero disables the Prometheus endpoint.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 9090 }
    }
}

impl WardenConfig {
    /// Loads the layered configuration. A missing file is only an error when
    /// the path was given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        if required && !path.exists() {
            return Err(ConfigError::Load(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("analytics.filters.subjects")
            .with_list_parse_key("analytics.filters.skipped_subjects");

        config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(required),
            )
            .add_source(environment)
            .build()
            .and_then(|settings| settings.try_deserialize::<WardenConfig>())
            .map_err(|err| ConfigError::Load(err.to_string()))
    }

    /// Every violation found, empty when the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.log.level.parse::<tracing::Level>().is_err() {
            errors.push(format!("log.level {:?} is not a log level", self.log.level));
        }
        if self.cache.fetch_attempts == 0 {
            errors.push("cache.fetch_attempts must be at least 1".to_string());
        }
        if self.reload.tick_ms == 0 {
            errors.push("reload.tick_ms must be at least 1".to_string());
        }
        if self.reload.resubscribe_backoff_secs == 0 {
            errors.push("reload.resubscribe_backoff_secs must be at least 1".to_string());
        }
        if self.pubsub.channel.trim().is_empty() {
            errors.push("pubsub.channel must not be empty".to_string());
        }
        if self.pubsub.backend == Backend::Redis && self.pubsub.url.is_none() {
            errors.push("pubsub.url is required for the redis backend".to_string());
        }

        match self.analytics.options() {
            Ok(options) => errors.extend(options.validate()),
            Err(ConfigError::Invalid(found)) => errors.extend(found),
            Err(err) => errors.push(err.to_string()),
        }
        if self.analytics.enable
            && self.analytics.sink == Backend::Redis
            && self.analytics.sink_url.is_none()
        {
            errors.push("analytics.sink_url is required for the redis sink".to_string());
        }
        errors
    }

    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = WardenConfig::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        assert_eq!(config.reload.options().tick, Duration::from_secs(1));
        assert_eq!(config.reload.options().periodic_full_reload, None);
        assert_eq!(
            config.analytics.storage_expiration().unwrap(),
            Duration::from_secs(24 * 3600)
        );
    }

    #[test]
    #[serial]
    fn file_values_override_defaults() {
        let file = write_config(
            r#"
log:
  level: debug
  format: json
reload:
  periodic_full_reload_secs: 30
pubsub:
  channel: tenant-a.notifications
analytics:
  encoding: json
  storage_expiration: 90m
  filters:
    skipped_subjects: [healthcheck]
"#,
        );
        let config = WardenConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(
            config.reload.options().periodic_full_reload,
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.pubsub.channel, "tenant-a.notifications");
        assert_eq!(config.analytics.encoding, RecordEncoding::Json);
        assert_eq!(config.analytics.filters.skipped_subjects, vec!["healthcheck"]);
        assert_eq!(
            config.analytics.options().unwrap().storage_expiration,
            Duration::from_secs(90 * 60)
        );
        assert_eq!(config.analytics.pool_size, 50);
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let file = write_config("analytics:\n  pool_size: 4\n");
        std::env::set_var("WARDEN__ANALYTICS__POOL_SIZE", "12");
        std::env::set_var("WARDEN__RELOAD__VERIFY_SIGNATURES", "false");
        std::env::set_var("WARDEN__ANALYTICS__FILTERS__SUBJECTS", "alice,bob");
        let loaded = WardenConfig::load(Some(file.path()));
        std::env::remove_var("WARDEN__ANALYTICS__POOL_SIZE");
        std::env::remove_var("WARDEN__RELOAD__VERIFY_SIGNATURES");
        std::env::remove_var("WARDEN__ANALYTICS__FILTERS__SUBJECTS");

        let config = loaded.unwrap();
        assert_eq!(config.analytics.pool_size, 12);
        assert!(!config.reload.verify_signatures);
        assert_eq!(config.analytics.filters.subjects, vec!["alice", "bob"]);
    }

    #[test]
    #[serial]
    fn explicit_missing_file_is_an_error() {
        let err = WardenConfig::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut config = WardenConfig::default();
        config.log.level = "loud".into();
        config.reload.tick_ms = 0;
        config.pubsub.backend = Backend::Redis;
        config.analytics.pool_size = 0;
        config.analytics.flush_interval_ms = 0;
        config.analytics.sink = Backend::Redis;

        let errors = config.validate();
        assert_eq!(errors.len(), 6, "{errors:?}");
        assert!(matches!(config.ensure_valid(), Err(ConfigError::Invalid(found)) if found == errors));
    }

    #[test]
    fn disabled_analytics_skips_its_checks() {
        let mut config = WardenConfig::default();
        config.analytics.enable = false;
        config.analytics.pool_size = 0;
        config.analytics.sink = Backend::Redis;
        assert!(config.validate().is_empty());
    }

    #[test]
    fn bad_storage_expiration_is_reported() {
        let mut config = WardenConfig::default();
        config.analytics.storage_expiration = "a while".into();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("storage_expiration"));
    }

    #[test]
    fn retention_beyond_a_century_is_rejected() {
        let mut config = WardenConfig::default();
        config.analytics.storage_expiration = "300000y".into();
        let errors = config.validate();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("must not exceed 100 years"));
        assert!(config.ensure_valid().is_err());
    }
}
