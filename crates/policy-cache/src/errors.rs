use std::fmt;

use thiserror::Error;
use warden_core_types::WardenError;

/// The two resources a reload pulls from the backing store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Secrets,
    Policies,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Secrets => "secrets",
            Resource::Policies => "policies",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid document: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, Clone)]
pub enum CacheError {
    #[error("secret not found: {0}")]
    SecretNotFound(String),
    #[error("policy not found: {0}")]
    PolicyNotFound(String),
    #[error("list {resource} failed after {attempts} attempts: {source}")]
    BackingStore {
        resource: Resource,
        attempts: usize,
        #[source]
        source: StoreError,
    },
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CacheError::SecretNotFound(_) | CacheError::PolicyNotFound(_)
        )
    }
}

impl From<CacheError> for WardenError {
    fn from(value: CacheError) -> Self {
        WardenError::new(value.to_string())
    }
}
