use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounterVec, IntGauge, Registry};
use tracing::error;

use crate::errors::Resource;
use crate::model::CacheStats;

lazy_static! {
    static ref CACHE_RELOADS: IntCounterVec = IntCounterVec::new(
        opts!("warden_cache_reloads_total", "Cache reloads grouped by outcome"),
        &["outcome"]
    )
    .unwrap();
    static ref CACHE_FETCH_FAILURES: IntCounterVec = IntCounterVec::new(
        opts!(
            "warden_cache_fetch_failures_total",
            "Backing store listings that exhausted their retries"
        ),
        &["resource"]
    )
    .unwrap();
    static ref CACHE_REVISION: IntGauge =
        IntGauge::new("warden_cache_revision", "Revision of the live cache snapshot").unwrap();
    static ref CACHE_SECRETS: IntGauge =
        IntGauge::new("warden_cache_secrets", "Secrets held by the live snapshot").unwrap();
    static ref CACHE_POLICIES: IntGauge =
        IntGauge::new("warden_cache_policies", "Policies held by the live snapshot").unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register cache metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, CACHE_RELOADS.clone());
    register(registry, CACHE_FETCH_FAILURES.clone());
    register(registry, CACHE_REVISION.clone());
    register(registry, CACHE_SECRETS.clone());
    register(registry, CACHE_POLICIES.clone());
}

pub fn record_reload_ok(stats: &CacheStats) {
    CACHE_RELOADS.with_label_values(&["ok"]).inc();
    CACHE_REVISION.set(stats.revision as i64);
    CACHE_SECRETS.set(stats.secrets as i64);
    CACHE_POLICIES.set(stats.policies as i64);
}

pub fn record_reload_failed(resource: Resource) {
    CACHE_RELOADS.with_label_values(&["failed"]).inc();
    CACHE_FETCH_FAILURES
        .with_label_values(&[resource.as_str()])
        .inc();
}
