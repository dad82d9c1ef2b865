use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::sleep;
use warden_core_types::Effect;

use crate::encoding::{RecordEncoder, RecordEncoding};
use crate::errors::{AnalyticsError, SinkError};
use crate::filters::AnalyticsFilters;
use crate::options::AnalyticsOptions;
use crate::outcome::{FlushObserver, FlushOutcome, FlushTrigger};
use crate::pipeline::{AnalyticsPipeline, RecordStatus, ANALYTICS_KEY};
use crate::record::{AnalyticsRecord, MAX_RETENTION_SECS};
use crate::sink::InMemorySink;

#[derive(Default)]
struct RecordingObserver {
    outcomes: Mutex<Vec<FlushOutcome>>,
}

impl RecordingObserver {
    fn outcomes(&self) -> Vec<FlushOutcome> {
        self.outcomes.lock().clone()
    }
}

impl FlushObserver for RecordingObserver {
    fn on_flush(&self, outcome: &FlushOutcome) {
        self.outcomes.lock().push(outcome.clone());
    }
}

/// Json encoder that refuses one subject.
struct PoisonEncoder;

impl RecordEncoder for PoisonEncoder {
    fn encode(&self, record: &AnalyticsRecord) -> Result<Vec<u8>, AnalyticsError> {
        if record.subject == "poison" {
            return Err(AnalyticsError::Encode("refused".into()));
        }
        RecordEncoding::Json.encode(record)
    }
}

fn options(pool_size: usize, records_buffer_size: usize, flush_ms: u64) -> AnalyticsOptions {
    AnalyticsOptions {
        pool_size,
        records_buffer_size,
        flush_interval: Duration::from_millis(flush_ms),
        encoding: RecordEncoding::Json,
        ..AnalyticsOptions::default()
    }
}

fn record(subject: &str) -> AnalyticsRecord {
    AnalyticsRecord::new(subject, Effect::Allow, "policy matched").with_details(
        r#"{"action":"read"}"#,
        r#"["p-1"]"#,
        "p-1",
    )
}

struct Harness {
    sink: Arc<InMemorySink>,
    observer: Arc<RecordingObserver>,
    pipeline: AnalyticsPipeline,
}

fn harness(options: AnalyticsOptions) -> Harness {
    let sink = Arc::new(InMemorySink::new());
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = AnalyticsPipeline::new(options, sink.clone()).with_observer(observer.clone());
    Harness {
        sink,
        observer,
        pipeline,
    }
}

fn decode_all(sink: &InMemorySink) -> Vec<AnalyticsRecord> {
    sink.records()
        .iter()
        .map(|bytes| RecordEncoding::Json.decode(bytes).unwrap())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn full_worker_buffer_flushes_once() {
    let h = harness(options(1, 10, 1000));
    h.pipeline.start().await.unwrap();
    assert!(h.sink.is_connected());
    assert_eq!(h.pipeline.worker_buffer_size(), 10);

    for i in 0..10 {
        assert!(h.pipeline.record_hit(record(&format!("user-{i}"))).is_accepted());
    }
    sleep(Duration::from_millis(10)).await;

    let batches = h.sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].key, ANALYTICS_KEY);
    assert_eq!(batches[0].records.len(), 10);
    assert_eq!(
        h.observer.outcomes(),
        vec![FlushOutcome::Delivered {
            worker: 0,
            records: 10,
            trigger: FlushTrigger::Size,
        }]
    );

    let subjects: Vec<_> = decode_all(&h.sink).into_iter().map(|r| r.subject).collect();
    let expected: Vec<_> = (0..10).map(|i| format!("user-{i}")).collect();
    assert_eq!(subjects, expected);

    h.pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn single_record_is_flushed_by_time() {
    let h = harness(options(1, 10, 200));
    h.pipeline.start().await.unwrap();

    h.pipeline.record_hit(record("alice"));
    sleep(Duration::from_millis(1_500)).await;

    let batches = h.sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].records.len(), 1);

    h.pipeline.stop().await;
    assert_eq!(h.sink.batches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn trickling_records_are_force_flushed_after_one_second() {
    let h = harness(options(1, 100, 1000));
    h.pipeline.start().await.unwrap();

    // every arrival restarts the flush interval, so only the forced flush fires
    for i in 0..5 {
        h.pipeline.record_hit(record(&format!("user-{i}")));
        sleep(Duration::from_millis(300)).await;
    }

    let outcomes = h.observer.outcomes();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].trigger(), FlushTrigger::Forced);
    assert_eq!(outcomes[0].records(), 5);

    h.pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_drains_every_accepted_record() {
    let h = harness(options(4, 1000, 1000));
    h.pipeline.start().await.unwrap();

    for i in 0..100 {
        assert_eq!(
            h.pipeline.record_hit(record(&format!("user-{i}"))),
            RecordStatus::Accepted
        );
    }
    h.pipeline.stop().await;

    assert!(!h.pipeline.is_running());
    assert_eq!(h.sink.record_count(), 100);
    assert!(h
        .observer
        .outcomes()
        .iter()
        .all(|o| o.is_delivered() && o.trigger() == FlushTrigger::Drain));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_lose_nothing_on_stop() {
    let h = harness(options(8, 10_000, 50));
    h.pipeline.start().await.unwrap();
    let pipeline = Arc::new(h.pipeline);

    let mut producers = Vec::new();
    for p in 0..4 {
        let pipeline = Arc::clone(&pipeline);
        producers.push(tokio::spawn(async move {
            let mut accepted = 0;
            for i in 0..500 {
                if pipeline.record_hit(record(&format!("p{p}-{i}"))).is_accepted() {
                    accepted += 1;
                }
                if i % 100 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            accepted
        }));
    }
    let mut accepted = 0;
    for producer in producers {
        accepted += producer.await.unwrap();
    }
    pipeline.stop().await;

    assert_eq!(accepted, 2_000);
    let subjects: HashSet<_> = decode_all(&h.sink).into_iter().map(|r| r.subject).collect();
    assert_eq!(subjects.len(), 2_000);
}

#[tokio::test(start_paused = true)]
async fn records_after_stop_are_discarded() {
    let h = harness(options(2, 10, 200));
    assert_eq!(h.pipeline.record_hit(record("early")), RecordStatus::Stopped);

    h.pipeline.start().await.unwrap();
    h.pipeline.stop().await;

    assert_eq!(h.pipeline.record_hit(record("late")), RecordStatus::Stopped);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.sink.record_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn encode_failures_drop_only_that_record() {
    let sink = Arc::new(InMemorySink::new());
    let pipeline =
        AnalyticsPipeline::new(options(1, 10, 200), sink.clone()).with_encoder(Arc::new(PoisonEncoder));
    pipeline.start().await.unwrap();

    pipeline.record_hit(record("alice"));
    pipeline.record_hit(record("poison"));
    pipeline.record_hit(record("bob"));
    pipeline.stop().await;

    let subjects: Vec<_> = decode_all(&sink).into_iter().map(|r| r.subject).collect();
    assert_eq!(subjects, vec!["alice".to_string(), "bob".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn failed_flush_is_reported_and_not_retried() {
    let h = harness(options(1, 10, 200));
    h.pipeline.start().await.unwrap();
    h.sink.fail_next(1);

    h.pipeline.record_hit(record("alice"));
    sleep(Duration::from_millis(300)).await;
    h.pipeline.record_hit(record("bob"));
    sleep(Duration::from_millis(300)).await;
    h.pipeline.stop().await;

    let outcomes = h.observer.outcomes();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(
        outcomes[0],
        FlushOutcome::Failed {
            worker: 0,
            records: 1,
            trigger: FlushTrigger::Interval,
            error: SinkError::Write("injected failure".into()),
        }
    );
    assert!(outcomes[1].is_delivered());
    let subjects: Vec<_> = decode_all(&h.sink).into_iter().map(|r| r.subject).collect();
    assert_eq!(subjects, vec!["bob".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn filters_and_detail_stripping_apply_before_queueing() {
    let h = harness(AnalyticsOptions {
        enable_detailed_recording: false,
        filters: AnalyticsFilters {
            subjects: Vec::new(),
            skipped_subjects: vec!["healthcheck".into()],
        },
        ..options(1, 10, 200)
    });
    h.pipeline.start().await.unwrap();

    assert_eq!(
        h.pipeline.record_hit(record("healthcheck")),
        RecordStatus::Filtered
    );
    assert!(h.pipeline.record_hit(record("alice")).is_accepted());
    h.pipeline.stop().await;

    let records = decode_all(&h.sink);
    assert_eq!(records.len(), 1);
    let alice = &records[0];
    assert_eq!(alice.subject, "alice");
    assert_eq!(alice.conclusion, "policy matched");
    assert!(alice.request.is_empty());
    assert!(alice.policies.is_empty());
    assert!(alice.deciders.is_empty());
    assert!(alice.expire_at > Utc::now() + chrono::Duration::hours(23));
}

#[tokio::test(start_paused = true)]
async fn full_queue_rejects_without_blocking() {
    let h = harness(options(1, 2, 200));
    h.pipeline.start().await.unwrap();

    assert!(h.pipeline.record_hit(record("a")).is_accepted());
    assert!(h.pipeline.record_hit(record("b")).is_accepted());
    assert_eq!(h.pipeline.record_hit(record("c")), RecordStatus::QueueFull);

    h.pipeline.stop().await;
    assert_eq!(h.sink.record_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_guards() {
    let h = harness(options(1, 10, 200));
    h.pipeline.start().await.unwrap();
    assert_eq!(h.pipeline.start().await, Err(AnalyticsError::AlreadyStarted));
    h.pipeline.stop().await;

    // a stopped pipeline can be started again
    h.pipeline.start().await.unwrap();
    assert!(h.pipeline.record_hit(record("again")).is_accepted());
    h.pipeline.stop().await;
    assert_eq!(h.sink.record_count(), 1);

    let disabled = AnalyticsPipeline::new(
        AnalyticsOptions {
            enable: false,
            ..AnalyticsOptions::default()
        },
        Arc::new(InMemorySink::new()),
    );
    assert_eq!(disabled.record_hit(record("x")), RecordStatus::Disabled);
}

#[test]
fn expiry_zero_means_a_hundred_years() {
    let now = Utc::now();
    let mut rec = record("alice");
    rec.set_expiry_from(now, 0);
    assert_eq!((rec.expire_at - now).num_days(), 365 * 100);

    rec.set_expiry_from(now, 60);
    assert_eq!((rec.expire_at - now).num_seconds(), 60);
}

#[test]
fn oversized_expiry_is_capped_at_a_hundred_years() {
    let now = Utc::now();
    let mut rec = record("alice");
    rec.set_expiry_from(now, i64::MAX);
    assert_eq!((rec.expire_at - now).num_seconds(), MAX_RETENTION_SECS);

    rec.set_expiry_from(now, -5);
    assert_eq!((rec.expire_at - now).num_seconds(), MAX_RETENTION_SECS);
}

#[tokio::test(start_paused = true)]
async fn huge_retention_does_not_break_record_hit() {
    let h = harness(AnalyticsOptions {
        storage_expiration: Duration::from_secs(300_000 * 365 * 24 * 3600),
        ..options(1, 10, 200)
    });
    h.pipeline.start().await.unwrap();
    let before = Utc::now();
    assert!(h.pipeline.record_hit(record("alice")).is_accepted());
    h.pipeline.stop().await;

    let records = decode_all(&h.sink);
    assert_eq!(records.len(), 1);
    let retained = (records[0].expire_at - before).num_seconds();
    assert!(retained <= MAX_RETENTION_SECS + 5, "{retained}");
    assert!(retained >= MAX_RETENTION_SECS - 5, "{retained}");
}

#[test]
fn bincode_and_json_both_decode_back() {
    let rec = record("alice");
    for encoding in [RecordEncoding::Bincode, RecordEncoding::Json] {
        let bytes = encoding.encode(&rec).unwrap();
        assert_eq!(encoding.decode(&bytes).unwrap(), rec);
    }
    assert_eq!("JSON".parse::<RecordEncoding>().unwrap(), RecordEncoding::Json);
}
