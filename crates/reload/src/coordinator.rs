use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use warden_policy_cache::PolicyCache;

use crate::bus::NotificationBus;
use crate::errors::ReloadError;
use crate::metrics;
use crate::request::{ReloadQueue, ReloadRequest};

#[derive(Clone, Debug)]
pub struct ReloadOptions {
    /// Debounce window; pending requests are drained once per tick.
    pub tick: Duration,
    pub resubscribe_backoff: Duration,
    /// Enqueues a reload on this period even without notifications.
    pub periodic_full_reload: Option<Duration>,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            resubscribe_backoff: Duration::from_secs(10),
            periodic_full_reload: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Queued,
    Reloading,
    Stopped,
}

/// Debounces reload requests into at most one cache reload per tick and owns
/// the subscription loop feeding it.
pub struct ReloadCoordinator {
    cache: Arc<dyn PolicyCache>,
    options: ReloadOptions,
    token: CancellationToken,
    queue: ReloadQueue,
    intake: Mutex<Option<mpsc::Receiver<ReloadRequest>>>,
    pending: Mutex<Vec<ReloadRequest>>,
    reloading: AtomicBool,
    cycles: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ReloadCoordinator {
    pub fn new(
        cache: Arc<dyn PolicyCache>,
        options: ReloadOptions,
        token: CancellationToken,
    ) -> Arc<Self> {
        let (queue, intake) = ReloadQueue::channel();
        Arc::new(Self {
            cache,
            options,
            token,
            queue,
            intake: Mutex::new(Some(intake)),
            pending: Mutex::new(Vec::new()),
            reloading: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Handle for producers; also what a `NotificationBus` is built with.
    pub fn queue(&self) -> ReloadQueue {
        self.queue.clone()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn state(&self) -> CoordinatorState {
        if self.token.is_cancelled() {
            CoordinatorState::Stopped
        } else if self.reloading.load(Ordering::SeqCst) {
            CoordinatorState::Reloading
        } else if !self.pending.lock().is_empty() {
            CoordinatorState::Queued
        } else {
            CoordinatorState::Idle
        }
    }

    /// Number of debounced reloads performed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Spawns the intake and debounce loops, plus the subscribe loop when a
    /// bus is given. Can only be called once.
    pub fn start(self: &Arc<Self>, bus: Option<Arc<NotificationBus>>) -> Result<(), ReloadError> {
        if self.token.is_cancelled() {
            return Err(ReloadError::Stopped);
        }
        let intake = self.intake.lock().take().ok_or(ReloadError::AlreadyStarted)?;

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(Arc::clone(self).intake_loop(intake)));
        tasks.push(tokio::spawn(Arc::clone(self).debounce_loop()));
        if let Some(bus) = bus {
            tasks.push(tokio::spawn(Arc::clone(self).subscribe_loop(bus)));
        }
        info!(
            tick_ms = self.options.tick.as_millis() as u64,
            loops = tasks.len(),
            "reload coordinator started"
        );
        Ok(())
    }

    /// Cancels every loop and waits for them to exit. Requests still pending
    /// are dropped without running their callbacks.
    pub async fn stop(&self) {
        self.token.cancel();
        let tasks = mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(err) = task.await {
                error!(%err, "reload loop terminated abnormally");
            }
        }
        let dropped = mem::take(&mut *self.pending.lock());
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "discarding pending reload requests");
        }
        info!("reload coordinator stopped");
    }

    async fn intake_loop(self: Arc<Self>, mut intake: mpsc::Receiver<ReloadRequest>) {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                request = intake.recv() => match request {
                    Some(request) => {
                        self.pending.lock().push(request);
                        metrics::record_request_queued();
                    }
                    None => break,
                },
            }
        }
        debug!("reload intake loop exited");
    }

    async fn debounce_loop(self: Arc<Self>) {
        let mut ticker = interval_at(Instant::now() + self.options.tick, self.options.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut periodic = self.options.periodic_full_reload.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => self.run_cycle().await,
                _ = tick_or_never(&mut periodic) => {
                    debug!("periodic full reload queued");
                    self.pending.lock().push(ReloadRequest::new());
                }
            }
        }
        debug!("reload debounce loop exited");
    }

    async fn run_cycle(&self) {
        let batch = mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return;
        }

        self.reloading.store(true, Ordering::SeqCst);
        let result = self.cache.reload().await;
        self.reloading.store(false, Ordering::SeqCst);
        self.cycles.fetch_add(1, Ordering::SeqCst);

        match &result {
            Ok(stats) => {
                metrics::record_cycle(true);
                info!(
                    requests = batch.len(),
                    revision = stats.revision,
                    "debounced reload completed"
                );
            }
            Err(err) => {
                metrics::record_cycle(false);
                error!(%err, requests = batch.len(), "debounced reload failed");
            }
        }

        for request in batch {
            request.complete();
        }
    }

    async fn subscribe_loop(self: Arc<Self>, bus: Arc<NotificationBus>) {
        let backoff = self.options.resubscribe_backoff;
        loop {
            match bus.subscribe().await {
                Ok(subscription) => {
                    info!(channel = %bus.channel(), "subscribed to notifications");
                    match bus.consume(subscription, &self.token).await {
                        Ok(()) => break,
                        Err(err) if err.is_unavailable() => {
                            warn!(%err, "notification subscription lost")
                        }
                        Err(err) => error!(%err, "notification subscription lost"),
                    }
                }
                Err(err) if err.is_unavailable() => {
                    warn!(%err, "pub/sub store unavailable, cannot subscribe")
                }
                Err(err) => error!(%err, "failed to subscribe to notifications"),
            }

            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            metrics::record_resubscribe();
            debug!(backoff_secs = backoff.as_secs(), "resubscribing to notifications");
        }
        debug!("notification subscribe loop exited");
    }
}

async fn tick_or_never(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
