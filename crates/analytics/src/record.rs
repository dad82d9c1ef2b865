use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use warden_core_types::Effect;

/// Longest retention a record can carry.
pub const MAX_RETENTION_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// One authorization decision as delivered to the telemetry sink.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    /// Unix seconds.
    pub timestamp: i64,
    pub subject: String,
    pub effect: Effect,
    pub conclusion: String,
    pub request: String,
    pub policies: String,
    pub deciders: String,
    pub expire_at: DateTime<Utc>,
}

impl AnalyticsRecord {
    pub fn new(subject: impl Into<String>, effect: Effect, conclusion: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            timestamp: now.timestamp(),
            subject: subject.into(),
            effect,
            conclusion: conclusion.into(),
            request: String::new(),
            policies: String::new(),
            deciders: String::new(),
            expire_at: now,
        }
    }

    pub fn with_details(
        mut self,
        request: impl Into<String>,
        policies: impl Into<String>,
        deciders: impl Into<String>,
    ) -> Self {
        self.request = request.into();
        self.policies = policies.into();
        self.deciders = deciders.into();
        self
    }

    /// Sets the retention deadline `expires_in_secs` from now. Zero keeps the
    /// record for a hundred years, which is also the upper bound.
    pub fn set_expiry(&mut self, expires_in_secs: i64) {
        self.set_expiry_from(Utc::now(), expires_in_secs);
    }

    pub fn set_expiry_from(&mut self, now: DateTime<Utc>, expires_in_secs: i64) {
        let secs = if expires_in_secs <= 0 {
            MAX_RETENTION_SECS
        } else {
            expires_in_secs.min(MAX_RETENTION_SECS)
        };
        self.expire_at = TimeDelta::try_seconds(secs)
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Drops the request body and policy detail, keeping the decision itself.
    pub fn strip_details(&mut self) {
        self.request.clear();
        self.policies.clear();
        self.deciders.clear();
    }
}
