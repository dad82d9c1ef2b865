use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::StoreError;
use crate::model::{PolicyDocument, PolicyRecord, SecretRecord};
use crate::store::BackingStore;

/// Backing store that re-reads a YAML or JSON document on every listing.
///
/// ```yaml
/// secrets:
///   - secret_id: s-1
///     subject: alice
///     secret_key: k
/// policies:
///   - subject: alice
///     name: read-books
///     policy: { effect: allow, actions: [read], resources: ["books:*"] }
/// ```
///
/// A policy given as a JSON string is decoded as well. Policies that fail to
/// decode are skipped with a warning.
#[derive(Clone, Debug)]
pub struct FileBackingStore {
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    secrets: Vec<SecretRecord>,
    #[serde(default)]
    policies: Vec<PolicyEntry>,
}

#[derive(Debug, Deserialize)]
struct PolicyEntry {
    subject: String,
    #[serde(default)]
    name: String,
    policy: Value,
}

impl FileBackingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<StoreDocument, StoreError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => {
                    StoreError::Unavailable(format!("{}: {}", self.path.display(), err))
                }
                _ => StoreError::Io(format!("{}: {}", self.path.display(), err)),
            })?;
        let is_json = self
            .path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            serde_json::from_str(&content).map_err(|err| StoreError::Invalid(err.to_string()))
        } else {
            serde_yaml::from_str(&content).map_err(|err| StoreError::Invalid(err.to_string()))
        }
    }
}

fn decode_policy(value: Value) -> Result<PolicyDocument, String> {
    match value {
        Value::String(shadow) => serde_json::from_str(&shadow).map_err(|err| err.to_string()),
        other => serde_json::from_value(other).map_err(|err| err.to_string()),
    }
}

#[async_trait]
impl BackingStore for FileBackingStore {
    async fn list_secrets(&self) -> Result<HashMap<String, SecretRecord>, StoreError> {
        let document = self.read_document().await?;
        info!(count = document.secrets.len(), path = %self.path.display(), "loading secrets");
        Ok(document
            .secrets
            .into_iter()
            .map(|secret| (secret.secret_id.clone(), secret))
            .collect())
    }

    async fn list_policies(&self) -> Result<HashMap<String, Vec<PolicyRecord>>, StoreError> {
        let document = self.read_document().await?;
        info!(count = document.policies.len(), path = %self.path.display(), "loading policies");
        let mut grouped: HashMap<String, Vec<PolicyRecord>> = HashMap::new();
        for entry in document.policies {
            match decode_policy(entry.policy) {
                Ok(policy) => grouped
                    .entry(entry.subject.clone())
                    .or_default()
                    .push(PolicyRecord {
                        subject: entry.subject,
                        name: entry.name,
                        policy,
                    }),
                Err(err) => {
                    warn!(subject = %entry.subject, name = %entry.name, %err, "skipping undecodable policy");
                }
            }
        }
        Ok(grouped)
    }
}
