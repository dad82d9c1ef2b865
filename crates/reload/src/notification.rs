use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::NotificationError;

pub const SIGNATURE_ALGORITHM: &str = "sha256";

/// Command carried by a cluster notification. Commands this build does not
/// know are kept verbatim so they can be logged.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationCommand {
    PolicyChanged,
    SecretChanged,
    Other(String),
}

impl NotificationCommand {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationCommand::PolicyChanged => "PolicyChanged",
            NotificationCommand::SecretChanged => "SecretChanged",
            NotificationCommand::Other(raw) => raw,
        }
    }

    /// Whether receiving this command should refresh the cache.
    pub fn triggers_reload(&self) -> bool {
        matches!(
            self,
            NotificationCommand::PolicyChanged | NotificationCommand::SecretChanged
        )
    }
}

impl From<String> for NotificationCommand {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PolicyChanged" => NotificationCommand::PolicyChanged,
            "SecretChanged" => NotificationCommand::SecretChanged,
            _ => NotificationCommand::Other(value),
        }
    }
}

impl From<NotificationCommand> for String {
    fn from(value: NotificationCommand) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for NotificationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope published on the invalidation channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Notification {
    pub command: NotificationCommand,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub algorithm: String,
}

impl Notification {
    pub fn new(command: NotificationCommand, payload: impl Into<String>) -> Self {
        Self {
            command,
            payload: payload.into(),
            signature: String::new(),
            algorithm: String::new(),
        }
    }

    pub fn policy_changed(payload: impl Into<String>) -> Self {
        Self::new(NotificationCommand::PolicyChanged, payload)
    }

    pub fn secret_changed(payload: impl Into<String>) -> Self {
        Self::new(NotificationCommand::SecretChanged, payload)
    }

    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.command.as_str().as_bytes());
        hasher.update(self.payload.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Stamps the envelope with a SHA-256 over command and payload.
    pub fn sign(&mut self) {
        self.algorithm = SIGNATURE_ALGORITHM.to_string();
        self.signature = self.digest();
    }

    pub fn signed(mut self) -> Self {
        self.sign();
        self
    }

    pub fn verify(&self) -> Result<(), NotificationError> {
        if self.signature.is_empty() {
            return Err(NotificationError::MissingSignature);
        }
        if !self.algorithm.eq_ignore_ascii_case(SIGNATURE_ALGORITHM) {
            return Err(NotificationError::UnsupportedAlgorithm(
                self.algorithm.clone(),
            ));
        }
        if !self.signature.eq_ignore_ascii_case(&self.digest()) {
            return Err(NotificationError::SignatureMismatch);
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<String, NotificationError> {
        serde_json::to_string(self).map_err(|err| NotificationError::Malformed(err.to_string()))
    }

    pub fn decode(raw: &str) -> Result<Self, NotificationError> {
        serde_json::from_str(raw).map_err(|err| NotificationError::Malformed(err.to_string()))
    }
}
