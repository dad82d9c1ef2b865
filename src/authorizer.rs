//! Decision hot path: cached policies in, decision and telemetry out.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use warden_analytics::{AnalyticsPipeline, AnalyticsRecord};
use warden_core_types::Effect;
use warden_policy_cache::{CacheError, PolicyCache, PolicyRecord, SecretRecord};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub subject: String,
    pub action: String,
    pub resource: String,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
}

impl AccessRequest {
    pub fn new(
        subject: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            action: action.into(),
            resource: resource.into(),
            context: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub effect: Effect,
    pub conclusion: String,
    /// Names of the policies that decided the outcome.
    pub deciders: Vec<String>,
}

impl Decision {
    pub fn allowed(&self) -> bool {
        self.effect.is_allowed()
    }
}

/// The rule engine. Treated as a black box by the service.
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(&self, request: &AccessRequest, policies: &[PolicyRecord]) -> Decision;
}

/// Minimal evaluator: exact or trailing-`*` matching on actions and
/// resources, deny overrides allow, no match denies.
#[derive(Clone, Copy, Debug, Default)]
pub struct MatchingEvaluator;

fn pattern_matches(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

impl PolicyEvaluator for MatchingEvaluator {
    fn evaluate(&self, request: &AccessRequest, policies: &[PolicyRecord]) -> Decision {
        let matching: Vec<&PolicyRecord> = policies
            .iter()
            .filter(|record| {
                let doc = &record.policy;
                doc.actions.iter().any(|a| pattern_matches(a, &request.action))
                    && doc
                        .resources
                        .iter()
                        .any(|r| pattern_matches(r, &request.resource))
            })
            .collect();

        let denies: Vec<String> = matching
            .iter()
            .filter(|record| !record.policy.effect.is_allowed())
            .map(|record| record.name.clone())
            .collect();
        if !denies.is_empty() {
            return Decision {
                effect: Effect::Deny,
                conclusion: "request was denied by policy".to_string(),
                deciders: denies,
            };
        }
        if matching.is_empty() {
            return Decision {
                effect: Effect::Deny,
                conclusion: "no policy matched the request".to_string(),
                deciders: Vec::new(),
            };
        }
        Decision {
            effect: Effect::Allow,
            conclusion: "request was allowed by policy".to_string(),
            deciders: matching.iter().map(|record| record.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizeError {
    #[error("unknown secret: {0}")]
    UnknownSecret(String),
    #[error("secret {0} has expired")]
    ExpiredSecret(String),
}

pub struct Authorizer {
    cache: Arc<dyn PolicyCache>,
    evaluator: Arc<dyn PolicyEvaluator>,
    analytics: Option<Arc<AnalyticsPipeline>>,
}

impl Authorizer {
    pub fn new(
        cache: Arc<dyn PolicyCache>,
        evaluator: Arc<dyn PolicyEvaluator>,
        analytics: Option<Arc<AnalyticsPipeline>>,
    ) -> Self {
        Self {
            cache,
            evaluator,
            analytics,
        }
    }

    /// Resolves the key used to authenticate a caller. Expired secrets are
    /// rejected.
    pub fn verify_secret(&self, secret_id: &str) -> Result<Arc<SecretRecord>, AuthorizeError> {
        let secret = self.cache.get_secret(secret_id).map_err(|err| {
            debug!(%err, "secret lookup failed");
            AuthorizeError::UnknownSecret(secret_id.to_string())
        })?;
        if secret.is_expired(Utc::now()) {
            return Err(AuthorizeError::ExpiredSecret(secret_id.to_string()));
        }
        Ok(secret)
    }

    /// Decides `request` against the cached policies of its subject and
    /// records the decision. Never touches the backing store.
    pub fn authorize(&self, request: &AccessRequest) -> Decision {
        let policies = match self.cache.get_policy(&request.subject) {
            Ok(policies) => policies,
            Err(CacheError::PolicyNotFound(_)) => Arc::new(Vec::new()),
            Err(err) => {
                warn!(%err, subject = %request.subject, "policy lookup failed");
                Arc::new(Vec::new())
            }
        };
        let decision = self.evaluator.evaluate(request, &policies);
        debug!(
            subject = %request.subject,
            action = %request.action,
            resource = %request.resource,
            effect = %decision.effect,
            "authorization decided"
        );

        if let Some(analytics) = &self.analytics {
            let record = AnalyticsRecord::new(
                request.subject.clone(),
                decision.effect,
                decision.conclusion.clone(),
            )
            .with_details(
                serde_json::to_string(request).unwrap_or_default(),
                serde_json::to_string(policies.as_slice()).unwrap_or_default(),
                decision.deciders.join(","),
            );
            let status = analytics.record_hit(record);
            if !status.is_accepted() {
                debug!(?status, "decision record not queued");
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_policy_cache::{
        CacheOptions, InMemoryBackingStore, InMemoryPolicyCache, PolicyDocument,
    };

    fn policy(name: &str, effect: Effect, actions: &[&str], resources: &[&str]) -> PolicyRecord {
        PolicyRecord {
            subject: "alice".into(),
            name: name.into(),
            policy: PolicyDocument {
                id: name.into(),
                effect,
                actions: actions.iter().map(|s| s.to_string()).collect(),
                resources: resources.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn deny_overrides_allow() {
        let policies = vec![
            policy("read-all", Effect::Allow, &["read"], &["books:*"]),
            policy("no-secret-books", Effect::Deny, &["*"], &["books:secret"]),
        ];
        let evaluator = MatchingEvaluator;

        let open = evaluator.evaluate(&AccessRequest::new("alice", "read", "books:1"), &policies);
        assert!(open.allowed());
        assert_eq!(open.deciders, vec!["read-all".to_string()]);

        let closed = evaluator.evaluate(
            &AccessRequest::new("alice", "read", "books:secret"),
            &policies,
        );
        assert!(!closed.allowed());
        assert_eq!(closed.deciders, vec!["no-secret-books".to_string()]);

        let unmatched =
            evaluator.evaluate(&AccessRequest::new("alice", "write", "books:1"), &policies);
        assert!(!unmatched.allowed());
        assert!(unmatched.deciders.is_empty());
    }

    #[tokio::test]
    async fn unknown_subjects_are_denied_and_secrets_checked() {
        let store = Arc::new(InMemoryBackingStore::with_contents(
            [SecretRecord {
                secret_id: "s-old".into(),
                subject: "alice".into(),
                secret_key: "k".into(),
                expires: 1,
                description: String::new(),
            }],
            [policy("read-all", Effect::Allow, &["read"], &["books:*"])],
        ));
        let cache = Arc::new(InMemoryPolicyCache::new(store, CacheOptions::default()));
        cache.reload().await.unwrap();
        let authorizer = Authorizer::new(cache, Arc::new(MatchingEvaluator), None);

        assert!(authorizer
            .authorize(&AccessRequest::new("alice", "read", "books:1"))
            .allowed());
        assert!(!authorizer
            .authorize(&AccessRequest::new("mallory", "read", "books:1"))
            .allowed());

        assert_eq!(
            authorizer.verify_secret("s-old").unwrap_err(),
            AuthorizeError::ExpiredSecret("s-old".into())
        );
        assert_eq!(
            authorizer.verify_secret("s-missing").unwrap_err(),
            AuthorizeError::UnknownSecret("s-missing".into())
        );
    }
}
