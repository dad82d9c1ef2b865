use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::errors::TransportError;

/// Stream of raw messages received on one channel. A `Lagged` item means some
/// messages were lost; the stream ends when the channel is closed.
pub type Subscription = BoxStream<'static, Result<String, TransportError>>;

#[async_trait]
pub trait PubSubTransport: Send + Sync {
    async fn publish(&self, channel: &str, message: String) -> Result<(), TransportError>;
    async fn subscribe(&self, channel: &str) -> Result<Subscription, TransportError>;
}

const DEFAULT_CAPACITY: usize = 256;

/// Process-local broadcast medium over tokio broadcast channels.
pub struct InMemoryPubSub {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
    available: AtomicBool,
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPubSub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates the shared store going up or down. While down, publish and
    /// subscribe fail with `TransportError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drops the channel, ending every live subscription on it.
    pub fn close_channel(&self, channel: &str) {
        self.channels.lock().remove(channel);
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), TransportError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Unavailable("in-memory pub/sub is down".into()))
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .lock()
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

#[async_trait]
impl PubSubTransport for InMemoryPubSub {
    async fn publish(&self, channel: &str, message: String) -> Result<(), TransportError> {
        self.check_available()?;
        // Nobody listening is not an error for a broadcast medium.
        let _ = self.sender(channel).send(message);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, TransportError> {
        self.check_available()?;
        let rx = self.sender(channel).subscribe();
        let stream = stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(message) => Some((Ok(message), rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    Some((Err(TransportError::Lagged(skipped)), rx))
                }
                Err(broadcast::error::RecvError::Closed) => None,
            }
        });
        Ok(stream.boxed())
    }
}
