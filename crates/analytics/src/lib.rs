pub mod encoding;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod options;
pub mod outcome;
pub mod pipeline;
pub mod record;
pub mod sink;

pub use encoding::{RecordEncoder, RecordEncoding};
pub use errors::{AnalyticsError, SinkError};
pub use filters::AnalyticsFilters;
pub use options::AnalyticsOptions;
pub use outcome::{FlushObserver, FlushOutcome, FlushTrigger, LoggingFlushObserver};
pub use pipeline::{AnalyticsPipeline, RecordStatus, ANALYTICS_KEY, FORCED_FLUSH_INTERVAL};
pub use record::{AnalyticsRecord, MAX_RETENTION_SECS};
#[cfg(feature = "redis")]
pub use sink::RedisSink;
pub use sink::{AnalyticsSink, InMemorySink, SinkBatch};

#[cfg(test)]
mod tests;
