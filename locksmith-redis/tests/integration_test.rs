//! Lease lifecycle against a live Redis.
//!
//! Expects Redis at localhost:6379; all tests are ignored by default.
//! Run them with `cargo test -p locksmith-redis -- --ignored`.

use locksmith_client::{LeaseId, Locksmith};
use locksmith_redis::RedisConnector;
use std::sync::Arc;
use std::time::Duration;

fn unique_prefix() -> String {
    format!("locksmith-test:{}", LeaseId::random())
}

fn client_with_prefix(prefix: &str) -> Locksmith {
    Locksmith::builder("localhost", 6379)
        .with_connector(Arc::new(RedisConnector::new().with_prefix(prefix)))
        .build()
        .unwrap()
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_lease_lifecycle() {
    let prefix = unique_prefix();
    let client = client_with_prefix(&prefix);
    let rival = client_with_prefix(&prefix);

    let lease = client
        .try_acquire("orders", Duration::from_secs(30))
        .await
        .unwrap()
        .expect("lock should be free");

    // Held locks refuse a second lease, even through another client
    let contended = rival
        .try_acquire("orders", Duration::from_secs(30))
        .await
        .unwrap();
    assert!(contended.is_none());

    assert!(lease.release().await.unwrap());
    assert!(!lease.release().await.unwrap());

    let second = rival
        .try_acquire("orders", Duration::from_secs(30))
        .await
        .unwrap()
        .expect("released lock should be free");
    assert_ne!(second.id(), lease.id());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_expired_lease_is_reclaimed() {
    let client = client_with_prefix(&unique_prefix());

    let lease = client
        .try_acquire("orders", Duration::from_millis(200))
        .await
        .unwrap()
        .expect("lock should be free");

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(!lease.update(Duration::from_secs(30)).await.unwrap());
    let reclaimed = client
        .try_acquire("orders", Duration::from_secs(30))
        .await
        .unwrap();
    assert!(reclaimed.is_some());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_update_keeps_a_lease_alive() {
    let client = client_with_prefix(&unique_prefix());

    let lease = client
        .try_acquire("orders", Duration::from_millis(400))
        .await
        .unwrap()
        .expect("lock should be free");

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(lease.update(Duration::from_secs(30)).await.unwrap());

    // Past the original validity: the extension must hold
    tokio::time::sleep(Duration::from_millis(300)).await;
    let contended = client
        .try_acquire("orders", Duration::from_secs(30))
        .await
        .unwrap();
    assert!(contended.is_none());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_release_wakes_a_waiting_acquire() {
    let prefix = unique_prefix();
    let client = client_with_prefix(&prefix);

    let lease = client
        .try_acquire("orders", Duration::from_secs(30))
        .await
        .unwrap()
        .expect("lock should be free");

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        lease.release().await.unwrap();
    });

    let granted = client
        .acquire_timeout("orders", Duration::from_secs(30), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(granted.is_some());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_release_answers_false_for_an_orphaned_lease_key() {
    let prefix = unique_prefix();
    let client = client_with_prefix(&prefix);

    // A lease key whose name key is gone: the grant it belonged to no
    // longer exists, so releasing it must answer false.
    let redis = redis::Client::open("redis://localhost:6379/").unwrap();
    let mut conn = redis.get_connection_manager().await.unwrap();
    let orphan = LeaseId::random();
    let _: () = redis::cmd("SET")
        .arg(format!("{}:lease:{}", prefix, orphan))
        .arg("orders")
        .query_async(&mut conn)
        .await
        .unwrap();

    assert!(!client.release(&orphan).await.unwrap());

    // The stale key was still cleaned up
    let remains: i64 = redis::cmd("EXISTS")
        .arg(format!("{}:lease:{}", prefix, orphan))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(remains, 0);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_statistics_record() {
    let client = client_with_prefix(&unique_prefix());

    let lease = client
        .try_acquire("orders", Duration::from_secs(30))
        .await
        .unwrap()
        .expect("lock should be free");

    let record = client.statistics().await.unwrap();
    assert_eq!(record["locks"], 1);
    assert_eq!(record["acquired"], 1);

    lease.release().await.unwrap();
    let record = client.statistics().await.unwrap();
    assert_eq!(record["locks"], 0);
    assert_eq!(record["released"], 1);
}
