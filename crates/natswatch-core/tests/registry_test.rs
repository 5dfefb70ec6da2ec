#![allow(clippy::unwrap_used)]

mod support;

use std::time::Duration;

use natswatch_core::{CoreError, Session};
use support::{FakeBroker, cluster, registry, registry_with};

#[tokio::test(start_paused = true)]
async fn concurrent_gets_share_one_establishment() {
    let broker = FakeBroker::new();
    broker.set_connect_delay(Duration::from_millis(200));
    let registry = registry(&broker);

    let (a, b) = tokio::join!(registry.get("a"), registry.get("a"));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(broker.connects(), 1);
    assert!(a.is_live() && b.is_live());
    assert_eq!(a.cluster_id(), "a");

    a.session().close().await;
    assert!(b.session().is_closed(), "both callers hold the same session");
}

#[tokio::test]
async fn connections_are_reused() {
    let broker = FakeBroker::new();
    let registry = registry(&broker);

    registry.get("a").await.unwrap();
    registry.get("a").await.unwrap();
    registry.get("a").await.unwrap();

    assert_eq!(broker.connects(), 1);
    assert_eq!(registry.connected_clusters(), vec!["a".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn different_clusters_do_not_block_each_other() {
    let broker = FakeBroker::new();
    let registry = registry_with(&broker, vec![cluster("a"), cluster("b")]);

    broker.set_connect_delay(Duration::from_secs(60));
    let slow = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.get("a").await.map(|_| ()) })
    };
    // Let the slow establishment start and park on its delay.
    tokio::time::sleep(Duration::from_millis(1)).await;

    broker.set_connect_delay(Duration::ZERO);
    let started = tokio::time::Instant::now();
    registry.get("b").await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    slow.await.unwrap().unwrap();
    assert_eq!(broker.connects(), 2);
}

#[tokio::test]
async fn failure_is_not_cached() {
    let broker = FakeBroker::new();
    let registry = registry(&broker);

    broker.fail_connect(true);
    let err = registry.get("a").await.unwrap_err();
    assert!(matches!(err, CoreError::Connection { ref cluster, .. } if cluster == "a"));
    assert!(err.to_string().contains("connection refused"));
    assert!(registry.connected_clusters().is_empty());

    broker.fail_connect(false);
    registry.get("a").await.unwrap();
    assert_eq!(broker.connects(), 2);
}

#[tokio::test]
async fn closed_sessions_are_evicted_and_replaced() {
    let broker = FakeBroker::new();
    let registry = registry(&broker);

    let first = registry.get("a").await.unwrap();
    broker.close_all_sessions();
    assert!(!first.is_live());

    let second = registry.get("a").await.unwrap();
    assert!(second.is_live());
    assert_eq!(broker.connects(), 2);
}

#[tokio::test]
async fn close_one_and_close_all() {
    let broker = FakeBroker::new();
    let registry = registry_with(&broker, vec![cluster("a"), cluster("b")]);

    let a = registry.get("a").await.unwrap();
    let b = registry.get("b").await.unwrap();

    registry.close("a").await;
    assert!(a.session().is_closed());
    assert!(!b.session().is_closed());
    assert_eq!(registry.connected_clusters(), vec!["b".to_string()]);

    registry.close_all().await;
    assert!(b.session().is_closed());
    assert!(registry.connected_clusters().is_empty());

    // Closing an unknown cluster is a no-op.
    registry.close("zzz").await;
}

#[tokio::test]
async fn unknown_cluster_is_rejected_without_connecting() {
    let broker = FakeBroker::new();
    let registry = registry(&broker);

    let err = registry.get("nope").await.unwrap_err();
    assert!(matches!(err, CoreError::ClusterNotFound { .. }));
    assert!(err.is_invalid_request());
    assert_eq!(broker.connects(), 0);
}

#[tokio::test]
async fn resolve_uses_default_cluster() {
    let broker = FakeBroker::new();
    let registry = registry_with(&broker, vec![cluster("a"), cluster("b").as_default()]);

    assert_eq!(registry.resolve(None).unwrap().id, "b");
    assert_eq!(registry.resolve(Some("a")).unwrap().id, "a");

    let empty = registry_with(&broker, Vec::new());
    assert!(matches!(empty.resolve(None).unwrap_err(), CoreError::NoClusters));
}

#[tokio::test]
async fn endpoint_comes_from_cluster_config() {
    let broker = FakeBroker::new();
    let registry = registry(&broker);

    registry.get("a").await.unwrap();
    assert_eq!(broker.connected_urls(), vec!["nats://a.example:4222".to_string()]);
}
