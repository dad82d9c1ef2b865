use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use warden_analytics::{InMemorySink, RecordEncoding};
use warden_cli::config::WardenConfig;
use warden_cli::{AccessRequest, Overrides, Warden};
use warden_core_types::Effect;
use warden_policy_cache::{
    InMemoryBackingStore, PolicyCache, PolicyDocument, PolicyRecord, SecretRecord,
};
use warden_reload::{InMemoryPubSub, Notification};

fn policy(subject: &str, name: &str, effect: Effect, resource: &str) -> PolicyRecord {
    PolicyRecord {
        subject: subject.into(),
        name: name.into(),
        policy: PolicyDocument {
            id: name.into(),
            subjects: vec![subject.into()],
            effect,
            actions: vec!["read".into()],
            resources: vec![resource.into()],
            ..Default::default()
        },
    }
}

fn test_config() -> WardenConfig {
    let mut config = WardenConfig::default();
    config.metrics.port = 0;
    config.analytics.pool_size = 2;
    config.analytics.records_buffer_size = 100;
    config.analytics.encoding = RecordEncoding::Json;
    config
}

struct Node {
    warden: Warden,
}

fn node(
    store: Arc<InMemoryBackingStore>,
    pubsub: Arc<InMemoryPubSub>,
    sink: Arc<InMemorySink>,
) -> Node {
    let warden = Warden::build_with(
        test_config(),
        Overrides {
            store: Some(store),
            transport: Some(pubsub),
            sink: Some(sink),
            evaluator: None,
        },
    )
    .unwrap();
    Node { warden }
}

#[tokio::test(start_paused = true)]
async fn policy_change_on_one_node_reaches_the_other() {
    let store = Arc::new(InMemoryBackingStore::with_contents(
        [SecretRecord {
            secret_id: "s-1".into(),
            subject: "alice".into(),
            secret_key: "k".into(),
            expires: 0,
            description: String::new(),
        }],
        [policy("alice", "read-books", Effect::Allow, "books:*")],
    ));
    let pubsub = Arc::new(InMemoryPubSub::new());
    let sink = Arc::new(InMemorySink::new());

    let reader = node(store.clone(), pubsub.clone(), sink.clone());
    let writer = node(store.clone(), pubsub.clone(), Arc::new(InMemorySink::new()));

    let stats = reader.warden.start().await.unwrap().unwrap();
    assert_eq!(stats.revision, 1);
    writer.warden.start().await.unwrap();
    while pubsub.subscriber_count(&reader.warden.config().pubsub.channel) < 2 {
        sleep(Duration::from_millis(1)).await;
    }

    let authorizer = reader.warden.authorizer();
    let request = AccessRequest::new("alice", "read", "books:dune");
    assert!(authorizer.authorize(&request).allowed());
    assert_eq!(authorizer.verify_secret("s-1").unwrap().subject, "alice");

    // the writer changes the store and tells the cluster
    store.add_policy(policy("alice", "no-dune", Effect::Deny, "books:dune"));
    assert!(writer.warden.bus().notify(Notification::policy_changed("alice")).await);

    // nothing changes before the debounce tick
    assert!(authorizer.authorize(&request).allowed());
    sleep(Duration::from_millis(1_200)).await;

    assert_eq!(reader.warden.cache().stats().revision, 2);
    let decision = authorizer.authorize(&request);
    assert!(!decision.allowed());
    assert_eq!(decision.deciders, vec!["no-dune".to_string()]);

    writer.warden.shutdown().await;
    reader.warden.shutdown().await;

    // every decision made on the reader reached its sink
    let records: Vec<_> = sink
        .records()
        .iter()
        .map(|bytes| RecordEncoding::Json.decode(bytes).unwrap())
        .collect();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.subject == "alice"));
    let denied: Vec<_> = records.iter().filter(|r| r.effect == Effect::Deny).collect();
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].deciders, "no-dune");
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_intake_and_reload_loops() {
    let store = Arc::new(InMemoryBackingStore::new());
    let pubsub = Arc::new(InMemoryPubSub::new());
    let sink = Arc::new(InMemorySink::new());
    let n = node(store, pubsub.clone(), sink.clone());

    n.warden.start().await.unwrap();
    n.warden.shutdown().await;

    let analytics = n.warden.analytics().unwrap();
    assert!(!analytics.is_running());
    let decision = n
        .warden
        .authorizer()
        .authorize(&AccessRequest::new("bob", "read", "books:1"));
    assert!(!decision.allowed());

    assert!(n.warden.coordinator().queue().request_reload().await.is_err());
    assert_eq!(pubsub.subscriber_count(&n.warden.config().pubsub.channel), 0);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.record_count(), 0);
}

#[test]
fn invalid_configuration_is_rejected_at_build() {
    let mut config = test_config();
    config.analytics.flush_interval_ms = 5_000;
    config.reload.tick_ms = 0;
    let err = Warden::build(config).err().unwrap();
    let message = err.to_string();
    assert!(message.contains("flush_interval_ms"));
    assert!(message.contains("tick_ms"));
}
