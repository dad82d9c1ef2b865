use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::encoding::RecordEncoder;
use crate::errors::AnalyticsError;
use crate::metrics;
use crate::options::AnalyticsOptions;
use crate::outcome::{FlushObserver, FlushOutcome, FlushTrigger, LoggingFlushObserver};
use crate::record::AnalyticsRecord;
use crate::sink::AnalyticsSink;

pub const ANALYTICS_KEY: &str = "warden-system-analytics";

/// A non-empty buffer is flushed once this much time has passed since the
/// previous flush, even if neither size nor interval triggered.
pub const FORCED_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Result of handing one record to the pipeline. Never an error: telemetry
/// must not fail the decision path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    Accepted,
    /// Removed by the subject filters.
    Filtered,
    /// The pipeline is stopped or was never started.
    Stopped,
    /// The intake channel is at capacity.
    QueueFull,
    Disabled,
}

impl RecordStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RecordStatus::Accepted)
    }
}

type Intake = Arc<tokio::sync::Mutex<mpsc::Receiver<AnalyticsRecord>>>;

/// Batches decision records and delivers them to an `AnalyticsSink` from a
/// pool of worker tasks.
pub struct AnalyticsPipeline {
    options: AnalyticsOptions,
    sink: Arc<dyn AnalyticsSink>,
    encoder: Arc<dyn RecordEncoder>,
    observer: Arc<dyn FlushObserver>,
    key: String,
    stopped: AtomicBool,
    sender: RwLock<Option<mpsc::Sender<AnalyticsRecord>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AnalyticsPipeline {
    pub fn new(options: AnalyticsOptions, sink: Arc<dyn AnalyticsSink>) -> Self {
        let encoder: Arc<dyn RecordEncoder> = Arc::new(options.encoding);
        Self {
            options,
            sink,
            encoder,
            observer: Arc::new(LoggingFlushObserver),
            key: ANALYTICS_KEY.to_string(),
            stopped: AtomicBool::new(true),
            sender: RwLock::new(None),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn FlushObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn RecordEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn options(&self) -> &AnalyticsOptions {
        &self.options
    }

    pub fn worker_buffer_size(&self) -> usize {
        self.options.worker_buffer_size()
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    /// Connects the sink and launches the worker pool. A sink that cannot be
    /// reached yet is logged; workers keep attempting writes.
    pub async fn start(&self) -> Result<(), AnalyticsError> {
        if !self.workers.lock().is_empty() {
            return Err(AnalyticsError::AlreadyStarted);
        }

        if let Err(err) = self.sink.connect().await {
            warn!(%err, "analytics sink not reachable at start");
        }

        let pool_size = self.options.pool_size.max(1);
        let (tx, rx) = mpsc::channel(self.options.records_buffer_size.max(1));
        let intake: Intake = Arc::new(tokio::sync::Mutex::new(rx));

        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return Err(AnalyticsError::AlreadyStarted);
        }
        for id in 0..pool_size {
            let worker = Worker {
                id,
                intake: Arc::clone(&intake),
                sink: Arc::clone(&self.sink),
                encoder: Arc::clone(&self.encoder),
                observer: Arc::clone(&self.observer),
                key: self.key.clone(),
                buffer_size: self.worker_buffer_size(),
                flush_interval: self.options.flush_interval,
            };
            workers.push(tokio::spawn(worker.run()));
        }
        *self.sender.write() = Some(tx);
        self.stopped.store(false, Ordering::SeqCst);

        info!(
            pool_size,
            worker_buffer_size = self.worker_buffer_size(),
            flush_interval_ms = self.options.flush_interval.as_millis() as u64,
            "analytics pipeline started"
        );
        Ok(())
    }

    /// Stops intake, lets every worker flush what it holds, and waits for
    /// them to exit.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // Dropping the only sender closes the channel once it is drained.
        drop(self.sender.write().take());

        let workers = mem::take(&mut *self.workers.lock());
        let count = workers.len();
        for worker in workers {
            if let Err(err) = worker.await {
                error!(%err, "analytics worker terminated abnormally");
            }
        }
        if count > 0 {
            info!(workers = count, "analytics pipeline stopped");
        }
    }

    /// Queues a decision record without waiting.
    pub fn record_hit(&self, mut record: AnalyticsRecord) -> RecordStatus {
        if !self.options.enable {
            return RecordStatus::Disabled;
        }
        if self.stopped.load(Ordering::SeqCst) {
            return RecordStatus::Stopped;
        }
        if self.options.filters.should_filter(&record.subject) {
            return RecordStatus::Filtered;
        }
        if !self.options.enable_detailed_recording {
            record.strip_details();
        }
        let retention = self.options.storage_expiration.as_secs();
        record.set_expiry(i64::try_from(retention).unwrap_or(i64::MAX));

        let sender = self.sender.read();
        let Some(tx) = sender.as_ref() else {
            return RecordStatus::Stopped;
        };
        match tx.try_send(record) {
            Ok(()) => {
                metrics::record_accepted();
                RecordStatus::Accepted
            }
            Err(TrySendError::Full(record)) => {
                metrics::record_dropped("queue_full");
                debug!(subject = %record.subject, "analytics queue full, record dropped");
                RecordStatus::QueueFull
            }
            Err(TrySendError::Closed(_)) => RecordStatus::Stopped,
        }
    }
}

struct Worker {
    id: usize,
    intake: Intake,
    sink: Arc<dyn AnalyticsSink>,
    encoder: Arc<dyn RecordEncoder>,
    observer: Arc<dyn FlushObserver>,
    key: String,
    buffer_size: usize,
    flush_interval: Duration,
}

impl Worker {
    async fn run(self) {
        metrics::worker_started();
        let mut buffer: Vec<Vec<u8>> = Vec::with_capacity(self.buffer_size);
        let mut last_flush = Instant::now();

        loop {
            let mut trigger = None;
            tokio::select! {
                received = next_record(&self.intake) => match received {
                    Some(record) => {
                        match self.encoder.encode(&record) {
                            Ok(encoded) => buffer.push(encoded),
                            Err(err) => {
                                metrics::record_encode_failure();
                                error!(worker = self.id, subject = %record.subject, %err, "dropping analytics record");
                            }
                        }
                        if buffer.len() >= self.buffer_size {
                            trigger = Some(FlushTrigger::Size);
                        }
                    }
                    None => {
                        if !buffer.is_empty() {
                            self.flush(&mut buffer, FlushTrigger::Drain).await;
                        }
                        break;
                    }
                },
                _ = sleep(self.flush_interval) => trigger = Some(FlushTrigger::Interval),
            }

            if buffer.is_empty() {
                continue;
            }
            let trigger = match trigger {
                Some(trigger) => trigger,
                None if last_flush.elapsed() >= FORCED_FLUSH_INTERVAL => FlushTrigger::Forced,
                None => continue,
            };
            self.flush(&mut buffer, trigger).await;
            last_flush = Instant::now();
        }

        metrics::worker_stopped();
        debug!(worker = self.id, "analytics worker exited");
    }

    async fn flush(&self, buffer: &mut Vec<Vec<u8>>, trigger: FlushTrigger) {
        let batch = mem::replace(buffer, Vec::with_capacity(self.buffer_size));
        let records = batch.len();
        let outcome = match self.sink.append_batch(&self.key, batch).await {
            Ok(()) => FlushOutcome::Delivered {
                worker: self.id,
                records,
                trigger,
            },
            Err(error) => FlushOutcome::Failed {
                worker: self.id,
                records,
                trigger,
                error,
            },
        };
        self.observer.on_flush(&outcome);
    }
}

async fn next_record(intake: &Intake) -> Option<AnalyticsRecord> {
    intake.lock().await.recv().await
}
