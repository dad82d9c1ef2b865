use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_core_types::Effect;

/// Authorization secret as served by the backing store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub secret_id: String,
    pub subject: String,
    pub secret_key: String,
    /// Unix seconds; zero never expires.
    #[serde(default)]
    pub expires: i64,
    #[serde(default)]
    pub description: String,
}

impl SecretRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires > 0 && self.expires <= now.timestamp()
    }
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("secret_id", &self.secret_id)
            .field("subject", &self.subject)
            .field("secret_key", &"<redacted>")
            .field("expires", &self.expires)
            .field("description", &self.description)
            .finish()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub effect: Effect,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub conditions: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub subject: String,
    #[serde(default)]
    pub name: String,
    pub policy: PolicyDocument,
}

/// Immutable view of everything the last successful reload produced.
#[derive(Clone, Debug, Default)]
pub struct CacheSnapshot {
    pub revision: u64,
    pub loaded_at: Option<DateTime<Utc>>,
    secrets: HashMap<String, Arc<SecretRecord>>,
    policies: HashMap<String, Arc<Vec<PolicyRecord>>>,
}

impl CacheSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(
        revision: u64,
        secrets: HashMap<String, SecretRecord>,
        policies: HashMap<String, Vec<PolicyRecord>>,
    ) -> Self {
        Self {
            revision,
            loaded_at: Some(Utc::now()),
            secrets: secrets
                .into_iter()
                .map(|(id, secret)| (id, Arc::new(secret)))
                .collect(),
            policies: policies
                .into_iter()
                .map(|(subject, list)| (subject, Arc::new(list)))
                .collect(),
        }
    }

    pub fn secret(&self, secret_id: &str) -> Option<&Arc<SecretRecord>> {
        self.secrets.get(secret_id)
    }

    pub fn policies(&self, subject: &str) -> Option<&Arc<Vec<PolicyRecord>>> {
        self.policies.get(subject)
    }

    pub fn secret_ids(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// Compares cached data only, ignoring revision and load time.
    pub fn same_contents(&self, other: &CacheSnapshot) -> bool {
        self.secrets == other.secrets && self.policies == other.policies
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            revision: self.revision,
            secrets: self.secrets.len(),
            subjects: self.policies.len(),
            policies: self.policies.values().map(|list| list.len()).sum(),
            loaded_at: self.loaded_at,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub revision: u64,
    pub secrets: usize,
    pub subjects: usize,
    pub policies: usize,
    pub loaded_at: Option<DateTime<Utc>>,
}
