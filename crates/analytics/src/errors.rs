use thiserror::Error;
use warden_core_types::WardenError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("telemetry sink unavailable: {0}")]
    Unavailable(String),
    #[error("telemetry sink write failed: {0}")]
    Write(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("failed to encode analytics record: {0}")]
    Encode(String),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("analytics pipeline already started")]
    AlreadyStarted,
    #[error("invalid analytics options: {}", .0.join("; "))]
    InvalidOptions(Vec<String>),
}

impl From<AnalyticsError> for WardenError {
    fn from(value: AnalyticsError) -> Self {
        WardenError::new(value.to_string())
    }
}

impl From<SinkError> for WardenError {
    fn from(value: SinkError) -> Self {
        WardenError::new(value.to_string())
    }
}
