//! Composition root: builds every component once from the configuration and
//! owns their lifecycle.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use warden_analytics::{AnalyticsPipeline, AnalyticsSink, InMemorySink};
use warden_policy_cache::{
    BackingStore, CacheStats, FileBackingStore, InMemoryBackingStore, InMemoryPolicyCache,
    PolicyCache,
};
use warden_reload::{InMemoryPubSub, NotificationBus, PubSubTransport, ReloadCoordinator};

use crate::authorizer::{Authorizer, MatchingEvaluator, PolicyEvaluator};
use crate::config::{Backend, WardenConfig};
use crate::errors::{AppError, ConfigError};

/// Externally supplied collaborators. Anything left `None` is built from the
/// configuration.
#[derive(Default)]
pub struct Overrides {
    pub store: Option<Arc<dyn BackingStore>>,
    pub transport: Option<Arc<dyn PubSubTransport>>,
    pub sink: Option<Arc<dyn AnalyticsSink>>,
    pub evaluator: Option<Arc<dyn PolicyEvaluator>>,
}

pub struct Warden {
    config: WardenConfig,
    cache: Arc<InMemoryPolicyCache>,
    coordinator: Arc<ReloadCoordinator>,
    bus: Arc<NotificationBus>,
    analytics: Option<Arc<AnalyticsPipeline>>,
    authorizer: Arc<Authorizer>,
}

impl Warden {
    pub fn build(config: WardenConfig) -> Result<Self, AppError> {
        Self::build_with(config, Overrides::default())
    }

    pub fn build_with(config: WardenConfig, overrides: Overrides) -> Result<Self, AppError> {
        config.ensure_valid()?;

        let store = match overrides.store {
            Some(store) => store,
            None => backing_store(&config),
        };
        let cache = Arc::new(InMemoryPolicyCache::new(store, config.cache.options()));

        let coordinator = ReloadCoordinator::new(
            cache.clone(),
            config.reload.options(),
            CancellationToken::new(),
        );
        let transport = match overrides.transport {
            Some(transport) => transport,
            None => transport(&config)?,
        };
        let bus = Arc::new(NotificationBus::new(
            transport,
            coordinator.queue(),
            config.pubsub.bus_options(&config.reload),
        ));

        let analytics = if config.analytics.enable {
            let sink = match overrides.sink {
                Some(sink) => sink,
                None => sink(&config)?,
            };
            Some(Arc::new(AnalyticsPipeline::new(
                config.analytics.options()?,
                sink,
            )))
        } else {
            None
        };

        let evaluator: Arc<dyn PolicyEvaluator> = match overrides.evaluator {
            Some(evaluator) => evaluator,
            None => Arc::new(MatchingEvaluator),
        };
        let authorizer = Arc::new(Authorizer::new(
            cache.clone(),
            evaluator,
            analytics.clone(),
        ));

        Ok(Self {
            config,
            cache,
            coordinator,
            bus,
            analytics,
            authorizer,
        })
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn cache(&self) -> Arc<InMemoryPolicyCache> {
        self.cache.clone()
    }

    pub fn coordinator(&self) -> Arc<ReloadCoordinator> {
        self.coordinator.clone()
    }

    pub fn bus(&self) -> Arc<NotificationBus> {
        self.bus.clone()
    }

    pub fn analytics(&self) -> Option<Arc<AnalyticsPipeline>> {
        self.analytics.clone()
    }

    pub fn authorizer(&self) -> Arc<Authorizer> {
        self.authorizer.clone()
    }

    /// Loads the cache once, then starts analytics and the reload loops. A
    /// failed initial load is logged; the reload loops retry on the next
    /// notification or periodic reload.
    pub async fn start(&self) -> Result<Option<CacheStats>, AppError> {
        let stats = match self.cache.reload().await {
            Ok(stats) => Some(stats),
            Err(err) => {
                error!(%err, "initial cache load failed, serving from an empty cache");
                None
            }
        };

        if let Some(analytics) = &self.analytics {
            analytics.start().await?;
        }
        self.coordinator.start(Some(self.bus.clone()))?;
        info!(
            channel = %self.config.pubsub.channel,
            analytics = self.analytics.is_some(),
            "warden started"
        );
        Ok(stats)
    }

    /// Drains analytics first so every accepted record is delivered, then
    /// cancels the reload loops.
    pub async fn shutdown(&self) {
        if let Some(analytics) = &self.analytics {
            analytics.stop().await;
        }
        self.coordinator.stop().await;
        info!("warden stopped");
    }
}

fn backing_store(config: &WardenConfig) -> Arc<dyn BackingStore> {
    match &config.cache.source {
        Some(path) => Arc::new(FileBackingStore::new(path)),
        None => {
            warn!("cache.source not set, using an empty in-memory store");
            Arc::new(InMemoryBackingStore::new())
        }
    }
}

fn transport(config: &WardenConfig) -> Result<Arc<dyn PubSubTransport>, AppError> {
    match config.pubsub.backend {
        Backend::Memory => Ok(Arc::new(InMemoryPubSub::new())),
        Backend::Redis => redis_transport(config),
    }
}

#[cfg(feature = "redis")]
fn redis_transport(config: &WardenConfig) -> Result<Arc<dyn PubSubTransport>, AppError> {
    let url = config.pubsub.url.as_deref().ok_or_else(|| {
        ConfigError::Invalid(vec!["pubsub.url is required for the redis backend".into()])
    })?;
    Ok(Arc::new(warden_reload::RedisPubSub::open(url)?))
}

#[cfg(not(feature = "redis"))]
fn redis_transport(_config: &WardenConfig) -> Result<Arc<dyn PubSubTransport>, AppError> {
    error!("pubsub.backend is redis but redis support is not compiled in");
    Err(ConfigError::Unsupported("redis pub/sub").into())
}

fn sink(config: &WardenConfig) -> Result<Arc<dyn AnalyticsSink>, AppError> {
    match config.analytics.sink {
        Backend::Memory => Ok(Arc::new(InMemorySink::new())),
        Backend::Redis => redis_sink(config),
    }
}

#[cfg(feature = "redis")]
fn redis_sink(config: &WardenConfig) -> Result<Arc<dyn AnalyticsSink>, AppError> {
    let url = config.analytics.sink_url.as_deref().ok_or_else(|| {
        ConfigError::Invalid(vec!["analytics.sink_url is required for the redis sink".into()])
    })?;
    Ok(Arc::new(warden_analytics::RedisSink::open(
        url,
        config.analytics.key_prefix.clone(),
    )?))
}

#[cfg(not(feature = "redis"))]
fn redis_sink(_config: &WardenConfig) -> Result<Arc<dyn AnalyticsSink>, AppError> {
    error!("analytics.sink is redis but redis support is not compiled in");
    Err(ConfigError::Unsupported("redis analytics sink").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    type Captured = Arc<Mutex<Vec<(Level, String)>>>;

    struct CaptureLayer(Captured);

    struct MessageVisitor<'a>(&'a mut String);

    impl Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                *self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            if let Ok(mut events) = self.0.lock() {
                events.push((*event.metadata().level(), message));
            }
        }
    }

    #[tokio::test]
    async fn failed_initial_load_is_logged_as_error() {
        let captured: Captured = Arc::default();
        let subscriber = tracing_subscriber::registry().with(CaptureLayer(captured.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut config = WardenConfig::default();
        config.cache.source = Some("/nonexistent/warden-store.yaml".into());
        config.cache.retry_delay_ms = 1;
        config.analytics.enable = false;
        let warden = Warden::build(config).unwrap();

        assert!(warden.start().await.unwrap().is_none());
        warden.shutdown().await;

        let events = captured.lock().unwrap();
        let (level, _) = events
            .iter()
            .find(|(_, message)| message.contains("initial cache load failed"))
            .expect("initial load failure logged");
        assert_eq!(*level, Level::ERROR);
    }
}
