use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::StoreError;
use crate::model::{PolicyRecord, SecretRecord};

/// Authoritative source the cache reloads from.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Every secret, keyed by secret id.
    async fn list_secrets(&self) -> Result<HashMap<String, SecretRecord>, StoreError>;
    /// Every policy, grouped by owning subject in store order.
    async fn list_policies(&self) -> Result<HashMap<String, Vec<PolicyRecord>>, StoreError>;
}

/// Mutable in-process store, for embedding and tests.
#[derive(Default)]
pub struct InMemoryBackingStore {
    secrets: RwLock<HashMap<String, SecretRecord>>,
    policies: RwLock<HashMap<String, Vec<PolicyRecord>>>,
}

impl InMemoryBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(
        secrets: impl IntoIterator<Item = SecretRecord>,
        policies: impl IntoIterator<Item = PolicyRecord>,
    ) -> Self {
        let store = Self::new();
        for secret in secrets {
            store.put_secret(secret);
        }
        for policy in policies {
            store.add_policy(policy);
        }
        store
    }

    pub fn put_secret(&self, secret: SecretRecord) {
        self.secrets
            .write()
            .insert(secret.secret_id.clone(), secret);
    }

    pub fn remove_secret(&self, secret_id: &str) -> bool {
        self.secrets.write().remove(secret_id).is_some()
    }

    pub fn add_policy(&self, policy: PolicyRecord) {
        self.policies
            .write()
            .entry(policy.subject.clone())
            .or_default()
            .push(policy);
    }

    pub fn clear_policies(&self, subject: &str) -> bool {
        self.policies.write().remove(subject).is_some()
    }
}

#[async_trait]
impl BackingStore for InMemoryBackingStore {
    async fn list_secrets(&self) -> Result<HashMap<String, SecretRecord>, StoreError> {
        Ok(self.secrets.read().clone())
    }

    async fn list_policies(&self) -> Result<HashMap<String, Vec<PolicyRecord>>, StoreError> {
        Ok(self.policies.read().clone())
    }
}
