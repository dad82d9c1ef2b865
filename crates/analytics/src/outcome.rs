use std::fmt;

use tracing::{debug, error};

use crate::errors::SinkError;
use crate::metrics;

/// What made a worker flush its buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The buffer reached the per-worker size.
    Size,
    /// The flush interval elapsed without a new record.
    Interval,
    /// Records kept trickling in, but the forced-flush interval elapsed.
    Forced,
    /// The intake channel closed and the worker is exiting.
    Drain,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Interval => "interval",
            FlushTrigger::Forced => "forced",
            FlushTrigger::Drain => "drain",
        }
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    Delivered {
        worker: usize,
        records: usize,
        trigger: FlushTrigger,
    },
    Failed {
        worker: usize,
        records: usize,
        trigger: FlushTrigger,
        error: SinkError,
    },
}

impl FlushOutcome {
    pub fn records(&self) -> usize {
        match self {
            FlushOutcome::Delivered { records, .. } | FlushOutcome::Failed { records, .. } => {
                *records
            }
        }
    }

    pub fn trigger(&self) -> FlushTrigger {
        match self {
            FlushOutcome::Delivered { trigger, .. } | FlushOutcome::Failed { trigger, .. } => {
                *trigger
            }
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, FlushOutcome::Delivered { .. })
    }
}

/// Receives the result of every flush. Called from the worker task, so
/// implementations must not block.
pub trait FlushObserver: Send + Sync {
    fn on_flush(&self, outcome: &FlushOutcome);
}

/// Logs each flush and feeds the analytics metrics.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingFlushObserver;

impl FlushObserver for LoggingFlushObserver {
    fn on_flush(&self, outcome: &FlushOutcome) {
        metrics::record_flush(outcome);
        match outcome {
            FlushOutcome::Delivered {
                worker,
                records,
                trigger,
            } => debug!(worker, records, %trigger, "analytics batch flushed"),
            FlushOutcome::Failed {
                worker,
                records,
                trigger,
                error,
            } => error!(worker, records, %trigger, %error, "analytics batch lost"),
        }
    }
}
