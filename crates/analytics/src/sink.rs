use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::SinkError;

/// Telemetry store receiving batched, already-encoded records.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn connect(&self) -> Result<(), SinkError>;
    /// Appends `records` in order under `key` as one batched write.
    async fn append_batch(&self, key: &str, records: Vec<Vec<u8>>) -> Result<(), SinkError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkBatch {
    pub key: String,
    pub records: Vec<Vec<u8>>,
}

/// Keeps every batch in memory. Can be told to fail writes.
#[derive(Default)]
pub struct InMemorySink {
    batches: Mutex<Vec<SinkBatch>>,
    connected: AtomicBool,
    failures: AtomicUsize,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `times` writes.
    pub fn fail_next(&self, times: usize) {
        self.failures.store(times, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<SinkBatch> {
        self.batches.lock().clone()
    }

    pub fn records(&self) -> Vec<Vec<u8>> {
        self.batches
            .lock()
            .iter()
            .flat_map(|batch| batch.records.iter().cloned())
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.batches.lock().iter().map(|b| b.records.len()).sum()
    }
}

#[async_trait]
impl AnalyticsSink for InMemorySink {
    async fn connect(&self) -> Result<(), SinkError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn append_batch(&self, key: &str, records: Vec<Vec<u8>>) -> Result<(), SinkError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SinkError::Write("injected failure".into()));
        }
        self.batches.lock().push(SinkBatch {
            key: key.to_string(),
            records,
        });
        Ok(())
    }
}

#[cfg(feature = "redis")]
mod redis_sink {
    use async_trait::async_trait;
    use redis::aio::ConnectionManager;
    use redis::RedisError;
    use tokio::sync::OnceCell;
    use tracing::debug;

    use super::AnalyticsSink;
    use crate::errors::SinkError;

    /// Appends batches to a Redis list with one pipelined RPUSH per record.
    pub struct RedisSink {
        client: redis::Client,
        key_prefix: String,
        manager: OnceCell<ConnectionManager>,
    }

    impl RedisSink {
        pub fn open(url: &str, key_prefix: impl Into<String>) -> Result<Self, SinkError> {
            let client = redis::Client::open(url)
                .map_err(|err| SinkError::Unavailable(format!("redis client: {err}")))?;
            Ok(Self {
                client,
                key_prefix: key_prefix.into(),
                manager: OnceCell::new(),
            })
        }

        fn namespaced_key(&self, key: &str) -> String {
            format!("{}{}", self.key_prefix, key)
        }

        async fn manager(&self) -> Result<ConnectionManager, SinkError> {
            self.manager
                .get_or_try_init(|| async {
                    ConnectionManager::new(self.client.clone())
                        .await
                        .map_err(|err| map_error("redis connect", err))
                })
                .await
                .cloned()
        }
    }

    fn map_error(context: &str, err: RedisError) -> SinkError {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            SinkError::Unavailable(format!("{context}: {err}"))
        } else {
            SinkError::Write(format!("{context}: {err}"))
        }
    }

    #[async_trait]
    impl AnalyticsSink for RedisSink {
        async fn connect(&self) -> Result<(), SinkError> {
            self.manager().await.map(|_| ())
        }

        async fn append_batch(&self, key: &str, records: Vec<Vec<u8>>) -> Result<(), SinkError> {
            if records.is_empty() {
                return Ok(());
            }
            let namespaced = self.namespaced_key(key);
            let count = records.len();
            let mut pipe = redis::pipe();
            for record in records {
                pipe.rpush(&namespaced, record).ignore();
            }
            let mut conn = self.manager().await?;
            pipe.query_async::<_, ()>(&mut conn)
                .await
                .map_err(|err| map_error("redis rpush", err))?;
            debug!(key = %namespaced, count, "analytics batch appended");
            Ok(())
        }
    }
}

#[cfg(feature = "redis")]
pub use redis_sink::RedisSink;
