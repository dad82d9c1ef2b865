use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Shared error type for the Warden crates.
#[derive(Debug, Error, Clone)]
pub enum WardenError {
    #[error("{message}")]
    Message { message: String },
}

impl WardenError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Outcome a policy asks for when it matches a request.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Effect {
    Allow,
    #[default]
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Effect::Allow)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = WardenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Effect::Allow),
            "deny" => Ok(Effect::Deny),
            other => Err(WardenError::new(format!("unknown effect: {other}"))),
        }
    }
}
