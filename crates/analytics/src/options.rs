use std::time::Duration;

use crate::encoding::RecordEncoding;
use crate::filters::AnalyticsFilters;
use crate::record::MAX_RETENTION_SECS;

#[derive(Clone, Debug, PartialEq)]
pub struct AnalyticsOptions {
    pub enable: bool,
    /// Number of worker tasks draining the intake channel.
    pub pool_size: usize,
    /// Capacity of the intake channel, split evenly between workers.
    pub records_buffer_size: usize,
    pub flush_interval: Duration,
    /// Retention stamped on each record; zero means a hundred years.
    pub storage_expiration: Duration,
    pub enable_detailed_recording: bool,
    pub encoding: RecordEncoding,
    pub filters: AnalyticsFilters,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            enable: true,
            pool_size: 50,
            records_buffer_size: 1000,
            flush_interval: Duration::from_millis(200),
            storage_expiration: Duration::from_secs(24 * 60 * 60),
            enable_detailed_recording: true,
            encoding: RecordEncoding::Bincode,
            filters: AnalyticsFilters::default(),
        }
    }
}

impl AnalyticsOptions {
    /// Records a worker buffers before flushing on size alone.
    pub fn worker_buffer_size(&self) -> usize {
        (self.records_buffer_size / self.pool_size.max(1)).max(1)
    }

    /// Lists every violation; empty when the options are usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.enable {
            return errors;
        }
        if self.pool_size == 0 {
            errors.push("analytics.pool_size must be at least 1".to_string());
        }
        if self.records_buffer_size == 0 {
            errors.push("analytics.records_buffer_size must be at least 1".to_string());
        }
        let flush_ms = self.flush_interval.as_millis();
        if !(1..=1000).contains(&flush_ms) {
            errors.push(format!(
                "analytics.flush_interval_ms must be between 1 and 1000, got {flush_ms}"
            ));
        }
        if self.storage_expiration.as_secs() > MAX_RETENTION_SECS as u64 {
            errors.push(format!(
                "analytics.storage_expiration must not exceed 100 years, got {}s",
                self.storage_expiration.as_secs()
            ));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = AnalyticsOptions::default();
        assert!(options.validate().is_empty());
        assert_eq!(options.worker_buffer_size(), 20);
    }

    #[test]
    fn flush_interval_out_of_range_is_reported() {
        let options = AnalyticsOptions {
            pool_size: 0,
            flush_interval: Duration::from_millis(1500),
            ..AnalyticsOptions::default()
        };
        let errors = options.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors[1].contains("flush_interval_ms"));

        let disabled = AnalyticsOptions {
            enable: false,
            ..options
        };
        assert!(disabled.validate().is_empty());
    }

    #[test]
    fn retention_beyond_a_century_is_reported() {
        let options = AnalyticsOptions {
            storage_expiration: Duration::from_secs(300_000 * 365 * 24 * 3600),
            ..AnalyticsOptions::default()
        };
        let errors = options.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("storage_expiration"));

        let century = AnalyticsOptions {
            storage_expiration: Duration::from_secs(MAX_RETENTION_SECS as u64),
            ..AnalyticsOptions::default()
        };
        assert!(century.validate().is_empty());
    }

    #[test]
    fn worker_buffer_never_drops_below_one() {
        let options = AnalyticsOptions {
            pool_size: 8,
            records_buffer_size: 3,
            ..AnalyticsOptions::default()
        };
        assert_eq!(options.worker_buffer_size(), 1);
    }
}
