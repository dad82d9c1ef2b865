use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::info;

use crate::errors::{CacheError, Resource, StoreError};
use crate::metrics;
use crate::model::{CacheSnapshot, CacheStats, PolicyRecord, SecretRecord};
use crate::retry::retry_async;
use crate::store::BackingStore;

/// Read side used by the decision path plus the reload hook used by the
/// reload coordinator. Lookups never touch the backing store.
#[async_trait]
pub trait PolicyCache: Send + Sync {
    fn get_secret(&self, secret_id: &str) -> Result<Arc<SecretRecord>, CacheError>;
    fn get_policy(&self, subject: &str) -> Result<Arc<Vec<PolicyRecord>>, CacheError>;
    async fn reload(&self) -> Result<CacheStats, CacheError>;
    fn snapshot(&self) -> Arc<CacheSnapshot>;

    fn stats(&self) -> CacheStats {
        self.snapshot().stats()
    }
}

#[derive(Clone, Debug)]
pub struct CacheOptions {
    pub fetch_attempts: usize,
    pub retry_delay: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            fetch_attempts: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

pub struct InMemoryPolicyCache {
    store: Arc<dyn BackingStore>,
    options: CacheOptions,
    current: ArcSwap<CacheSnapshot>,
    reload_lock: Mutex<()>,
    watch_tx: watch::Sender<Arc<CacheSnapshot>>,
}

impl InMemoryPolicyCache {
    pub fn new(store: Arc<dyn BackingStore>, options: CacheOptions) -> Self {
        let empty = Arc::new(CacheSnapshot::empty());
        let (watch_tx, _watch_rx) = watch::channel(Arc::clone(&empty));
        Self {
            store,
            options,
            current: ArcSwap::new(empty),
            reload_lock: Mutex::new(()),
            watch_tx,
        }
    }

    /// Streams every snapshot installed by a successful reload.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CacheSnapshot>> {
        self.watch_tx.subscribe()
    }

    async fn fetch<T, F, Fut>(&self, resource: Resource, op: F) -> Result<T, CacheError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let attempts = self.options.fetch_attempts.max(1);
        retry_async(resource.as_str(), op, attempts, self.options.retry_delay)
            .await
            .map_err(|source| {
                metrics::record_reload_failed(resource);
                CacheError::BackingStore {
                    resource,
                    attempts,
                    source,
                }
            })
    }
}

#[async_trait]
impl PolicyCache for InMemoryPolicyCache {
    fn get_secret(&self, secret_id: &str) -> Result<Arc<SecretRecord>, CacheError> {
        self.current
            .load()
            .secret(secret_id)
            .cloned()
            .ok_or_else(|| CacheError::SecretNotFound(secret_id.to_string()))
    }

    fn get_policy(&self, subject: &str) -> Result<Arc<Vec<PolicyRecord>>, CacheError> {
        self.current
            .load()
            .policies(subject)
            .cloned()
            .ok_or_else(|| CacheError::PolicyNotFound(subject.to_string()))
    }

    async fn reload(&self) -> Result<CacheStats, CacheError> {
        let _guard = self.reload_lock.lock().await;
        let started = Instant::now();

        // Both listings land in temporaries; the live snapshot only changes
        // once both have succeeded.
        let secrets = self
            .fetch(Resource::Secrets, || self.store.list_secrets())
            .await?;
        let policies = self
            .fetch(Resource::Policies, || self.store.list_policies())
            .await?;

        let revision = self.current.load().revision.saturating_add(1);
        let snapshot = Arc::new(CacheSnapshot::build(revision, secrets, policies));
        let stats = snapshot.stats();
        self.current.store(Arc::clone(&snapshot));
        self.watch_tx.send_replace(snapshot);

        metrics::record_reload_ok(&stats);
        info!(
            revision = stats.revision,
            secrets = stats.secrets,
            policies = stats.policies,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cache reloaded"
        );
        Ok(stats)
    }

    fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.current.load_full()
    }
}
