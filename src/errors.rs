use thiserror::Error;
use warden_analytics::{AnalyticsError, SinkError};
use warden_core_types::WardenError;
use warden_policy_cache::CacheError;
use warden_reload::{ReloadError, TransportError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("{0} support is not compiled in; rebuild with the `redis` feature")]
    Unsupported(&'static str),
}

/// Errors raised while assembling or running the service.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Reload(#[from] ReloadError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

impl From<SinkError> for AppError {
    fn from(value: SinkError) -> Self {
        AppError::Analytics(AnalyticsError::Sink(value))
    }
}

impl From<AppError> for WardenError {
    fn from(value: AppError) -> Self {
        WardenError::new(value.to_string())
    }
}
