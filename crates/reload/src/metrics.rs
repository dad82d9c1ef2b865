use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounter, IntCounterVec, Registry};
use tracing::error;

lazy_static! {
    static ref NOTIFICATIONS_RECEIVED: IntCounterVec = IntCounterVec::new(
        opts!(
            "warden_notifications_received_total",
            "Notifications accepted from the cluster channel"
        ),
        &["command"]
    )
    .unwrap();
    static ref NOTIFICATIONS_PUBLISHED: IntCounterVec = IntCounterVec::new(
        opts!(
            "warden_notifications_published_total",
            "Notifications published grouped by outcome"
        ),
        &["outcome"]
    )
    .unwrap();
    static ref NOTIFICATIONS_DROPPED: IntCounterVec = IntCounterVec::new(
        opts!(
            "warden_notifications_dropped_total",
            "Received notifications that did not trigger a reload"
        ),
        &["reason"]
    )
    .unwrap();
    static ref RELOAD_REQUESTS: IntCounter = IntCounter::new(
        "warden_reload_requests_total",
        "Reload requests moved onto the pending list"
    )
    .unwrap();
    static ref RELOAD_CYCLES: IntCounterVec = IntCounterVec::new(
        opts!(
            "warden_reload_cycles_total",
            "Debounced reload cycles grouped by outcome"
        ),
        &["outcome"]
    )
    .unwrap();
    static ref RESUBSCRIBES: IntCounter = IntCounter::new(
        "warden_pubsub_resubscribes_total",
        "Subscription attempts after a lost or failed subscription"
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register reload metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, NOTIFICATIONS_RECEIVED.clone());
    register(registry, NOTIFICATIONS_PUBLISHED.clone());
    register(registry, NOTIFICATIONS_DROPPED.clone());
    register(registry, RELOAD_REQUESTS.clone());
    register(registry, RELOAD_CYCLES.clone());
    register(registry, RESUBSCRIBES.clone());
}

pub fn record_received(command: &str) {
    NOTIFICATIONS_RECEIVED.with_label_values(&[command]).inc();
}

pub fn record_published(ok: bool) {
    let outcome = if ok { "ok" } else { "failed" };
    NOTIFICATIONS_PUBLISHED.with_label_values(&[outcome]).inc();
}

pub fn record_dropped(reason: &str) {
    NOTIFICATIONS_DROPPED.with_label_values(&[reason]).inc();
}

pub fn record_request_queued() {
    RELOAD_REQUESTS.inc();
}

pub fn record_cycle(ok: bool) {
    let outcome = if ok { "ok" } else { "failed" };
    RELOAD_CYCLES.with_label_values(&[outcome]).inc();
}

pub fn record_resubscribe() {
    RESUBSCRIBES.inc();
}
