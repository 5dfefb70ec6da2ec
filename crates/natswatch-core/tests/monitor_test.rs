#![allow(clippy::unwrap_used)]

mod support;

use natswatch_core::{CoreError, Health, Monitor};
use support::{FakeBroker, cluster, registry};

#[tokio::test]
async fn stream_listing_hides_kv_buckets() {
    let broker = FakeBroker::new();
    broker.add_stream("ORDERS", &["orders.>"]);
    broker.add_stream("KV_config", &["$KV.config.>"]);
    broker.add_stream("AUDIT", &["audit.>"]);
    broker.publish_to_stream("ORDERS", "orders.created", "{}");

    let monitor = Monitor::new(registry(&broker));
    let streams = monitor.list_streams("a").await.unwrap();

    let names: Vec<&str> = streams.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["AUDIT", "ORDERS"]);
    assert_eq!(streams[1].last_sequence, 1);
    assert_eq!(streams[1].subject_prefixes, vec!["orders.>".to_string()]);
}

#[tokio::test]
async fn message_lookup_by_sequence() {
    let broker = FakeBroker::new();
    broker.add_stream("ORDERS", &["orders.>"]);
    broker.publish_to_stream("ORDERS", "orders.created", "first");
    broker.publish_to_stream("ORDERS", "orders.created", "second");

    let monitor = Monitor::new(registry(&broker));
    let msg = monitor.get_message("a", "ORDERS", 2).await.unwrap();
    assert_eq!(msg.payload, "second");

    let err = monitor.get_message("a", "ORDERS", 9).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
    assert!(err.to_string().contains("ORDERS#9"));
}

#[tokio::test]
async fn consumer_listing_passes_through() {
    let broker = FakeBroker::new();
    broker.add_stream("ORDERS", &["orders.>"]);
    let registry = registry(&broker);
    let factory = natswatch_core::SubscriptionFactory::new(registry.clone());
    let handle = factory.open("a", "orders.*", Some("ORDERS")).await.unwrap();

    let monitor = Monitor::new(registry);
    let consumers = monitor.list_consumers("a", "ORDERS").await.unwrap();
    assert_eq!(consumers.len(), 1);
    assert_eq!(Some(consumers[0].name.as_str()), handle.kind().consumer());

    handle.stop().await;
    assert!(monitor.list_consumers("a", "ORDERS").await.unwrap().is_empty());
}

#[tokio::test]
async fn probe_uses_fresh_connection() {
    let broker = FakeBroker::new();
    let monitor = Monitor::new(registry(&broker));

    let status = monitor.test_connection(&cluster("b")).await;
    assert_eq!(status.status, Health::Healthy);
    assert_eq!(status.url, "nats://b.example:4222");
    assert!(status.error.is_none());
    assert_eq!(broker.connects(), 1);

    broker.fail_connect(true);
    let status = monitor.test_connection(&cluster("b")).await;
    assert_eq!(status.status, Health::Unhealthy);
    assert!(status.error.unwrap().contains("connection refused"));
}
