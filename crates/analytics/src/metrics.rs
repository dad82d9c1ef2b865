use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounter, IntCounterVec, IntGauge, Registry};
use tracing::error;

use crate::outcome::FlushOutcome;

lazy_static! {
    static ref RECORDS_ACCEPTED: IntCounter = IntCounter::new(
        "warden_analytics_records_accepted_total",
        "Decision records queued for delivery"
    )
    .unwrap();
    static ref RECORDS_DROPPED: IntCounterVec = IntCounterVec::new(
        opts!(
            "warden_analytics_records_dropped_total",
            "Decision records not queued, grouped by reason"
        ),
        &["reason"]
    )
    .unwrap();
    static ref ENCODE_FAILURES: IntCounter = IntCounter::new(
        "warden_analytics_encode_failures_total",
        "Decision records dropped because they could not be encoded"
    )
    .unwrap();
    static ref FLUSHES: IntCounterVec = IntCounterVec::new(
        opts!("warden_analytics_flushes_total", "Batched sink writes grouped by outcome"),
        &["outcome", "trigger"]
    )
    .unwrap();
    static ref RECORDS_FLUSHED: IntCounter = IntCounter::new(
        "warden_analytics_records_flushed_total",
        "Decision records delivered to the sink"
    )
    .unwrap();
    static ref ACTIVE_WORKERS: IntGauge = IntGauge::new(
        "warden_analytics_active_workers",
        "Analytics workers currently running"
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register analytics metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, RECORDS_ACCEPTED.clone());
    register(registry, RECORDS_DROPPED.clone());
    register(registry, ENCODE_FAILURES.clone());
    register(registry, FLUSHES.clone());
    register(registry, RECORDS_FLUSHED.clone());
    register(registry, ACTIVE_WORKERS.clone());
}

pub fn record_accepted() {
    RECORDS_ACCEPTED.inc();
}

pub fn record_dropped(reason: &str) {
    RECORDS_DROPPED.with_label_values(&[reason]).inc();
}

pub fn record_encode_failure() {
    ENCODE_FAILURES.inc();
}

pub fn record_flush(outcome: &FlushOutcome) {
    let trigger = outcome.trigger();
    if outcome.is_delivered() {
        FLUSHES.with_label_values(&["ok", trigger.as_str()]).inc();
        RECORDS_FLUSHED.inc_by(outcome.records() as u64);
    } else {
        FLUSHES.with_label_values(&["failed", trigger.as_str()]).inc();
    }
}

pub fn worker_started() {
    ACTIVE_WORKERS.inc();
}

pub fn worker_stopped() {
    ACTIVE_WORKERS.dec();
}
