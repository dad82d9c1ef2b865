use thiserror::Error;
use warden_core_types::WardenError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("pub/sub store unavailable: {0}")]
    Unavailable(String),
    #[error("subscription closed")]
    Closed,
    #[error("subscriber lagged behind by {0} messages")]
    Lagged(u64),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Store-down failures are expected during outages and logged quietly. A
    /// subscription that ends is the store dropping the connection.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TransportError::Unavailable(_) | TransportError::Closed)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("malformed notification: {0}")]
    Malformed(String),
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("notification signature missing")]
    MissingSignature,
    #[error("notification signature mismatch")]
    SignatureMismatch,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReloadError {
    #[error("reload coordinator already started")]
    AlreadyStarted,
    #[error("reload coordinator stopped")]
    Stopped,
}

impl From<TransportError> for WardenError {
    fn from(value: TransportError) -> Self {
        WardenError::new(value.to_string())
    }
}

impl From<ReloadError> for WardenError {
    fn from(value: ReloadError) -> Self {
        WardenError::new(value.to_string())
    }
}
