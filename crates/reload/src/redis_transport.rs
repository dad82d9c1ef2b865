use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::errors::TransportError;
use crate::transport::{PubSubTransport, Subscription};

/// Redis PUBLISH/SUBSCRIBE transport. Connections are opened lazily so the
/// service can start while Redis is down.
pub struct RedisPubSub {
    client: redis::Client,
    publisher: OnceCell<ConnectionManager>,
}

impl RedisPubSub {
    pub fn open(url: &str) -> Result<Self, TransportError> {
        let client = redis::Client::open(url)
            .map_err(|err| TransportError::Protocol(format!("redis client: {err}")))?;
        Ok(Self {
            client,
            publisher: OnceCell::new(),
        })
    }

    async fn publisher(&self) -> Result<ConnectionManager, TransportError> {
        self.publisher
            .get_or_try_init(|| async {
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|err| map_error("redis connect", err))
            })
            .await
            .cloned()
    }
}

fn map_error(context: &str, err: RedisError) -> TransportError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
        TransportError::Unavailable(format!("{context}: {err}"))
    } else {
        TransportError::Protocol(format!("{context}: {err}"))
    }
}

#[async_trait]
impl PubSubTransport for RedisPubSub {
    async fn publish(&self, channel: &str, message: String) -> Result<(), TransportError> {
        let mut conn = self.publisher().await?;
        let receivers: i64 = conn
            .publish(channel, message)
            .await
            .map_err(|err| map_error("redis publish", err))?;
        debug!(channel, receivers, "redis publish");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, TransportError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|err| map_error("redis subscribe", err))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|err| map_error("redis subscribe", err))?;
        let stream = pubsub.into_on_message().map(|msg| {
            msg.get_payload::<String>()
                .map_err(|err| TransportError::Protocol(format!("redis payload: {err}")))
        });
        Ok(stream.boxed())
    }
}
