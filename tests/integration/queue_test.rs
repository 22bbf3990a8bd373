//! Session queue and catalog tests run against both store backends.

use crate::common::{NAMESPACE, SqliteFile, buckets_job, objects_job};
use chrono::{Duration, Utc};
use ods_error::{OdsError, StoreError};
use ods_store::{MemoryStore, SqliteStore};
use ods_traits::{CatalogRepository, SessionQueue};
use ods_types::{BucketRecord, ObjectRecord, SessionId, SessionStatus};
use std::collections::HashSet;
use std::sync::Arc;

/// Claim from `workers` tasks until the queue is empty; returns every claimed id.
async fn claim_all<Q>(queue: Arc<Q>, workers: usize) -> Vec<SessionId>
where
    Q: SessionQueue + 'static,
{
    let mut handles = Vec::new();
    for _ in 0..workers {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(session) = queue.claim_next().await.unwrap() {
                assert_eq!(session.status, SessionStatus::InProgress);
                claimed.push(session.id);
                tokio::task::yield_now().await;
            }
            claimed
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.extend(handle.await.unwrap());
    }
    ids
}

async fn assert_claims_are_exclusive<Q>(queue: Arc<Q>)
where
    Q: SessionQueue + 'static,
{
    let mut created = HashSet::new();
    for _ in 0..25 {
        created.insert(queue.create_session(buckets_job()).await.unwrap().id);
    }

    let claimed = claim_all(queue.clone(), 6).await;
    let unique: HashSet<_> = claimed.iter().copied().collect();

    assert_eq!(claimed.len(), 25, "every session claimed exactly once");
    assert_eq!(unique, created);
    assert!(queue.claim_next().await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_claims_are_exclusive() {
    assert_claims_are_exclusive(Arc::new(MemoryStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_claims_are_exclusive() {
    let file = SqliteFile::new();
    assert_claims_are_exclusive(Arc::new(file.connect().await)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_claims_are_exclusive_across_pools() {
    // Two pools on one file behave like two worker processes.
    let file = SqliteFile::new();
    let first = Arc::new(file.connect().await);
    let second = Arc::new(file.connect().await);

    for _ in 0..20 {
        first.create_session(buckets_job()).await.unwrap();
    }

    let (a, b) = tokio::join!(claim_all(first, 3), claim_all(second, 3));
    let unique: HashSet<_> = a.iter().chain(b.iter()).copied().collect();

    assert_eq!(a.len() + b.len(), 20);
    assert_eq!(unique.len(), 20);
}

async fn assert_lifecycle<S>(store: &S)
where
    S: SessionQueue,
{
    let created = store
        .create_session(objects_job(Some("logs"), &["dev/"]))
        .await
        .unwrap();
    assert_eq!(created.status, SessionStatus::Pending);
    assert!(created.started_at.is_none());

    let claimed = store.claim_next().await.unwrap().unwrap();
    assert_eq!(claimed.id, created.id);
    assert_eq!(claimed.job, created.job);
    assert!(claimed.started_at.is_some());

    store.complete(&claimed.id, Some(7)).await.unwrap();
    // Completing twice is a no-op.
    store.complete(&claimed.id, Some(7)).await.unwrap();

    let done = store.get_session(&claimed.id).await.unwrap().unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
    assert_eq!(done.object_count, Some(7));
    assert!(done.completed_at.is_some());
    assert!(store.claim_next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_memory_session_lifecycle() {
    assert_lifecycle(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_session_lifecycle() {
    assert_lifecycle(&SqliteStore::in_memory().await.unwrap()).await;
}

async fn assert_pending_session_cannot_complete<S>(store: &S)
where
    S: SessionQueue,
{
    let session = store.create_session(buckets_job()).await.unwrap();
    let err = store.complete(&session.id, None).await.unwrap_err();
    assert!(matches!(err, OdsError::Store(StoreError::InvalidTransition(_))));

    let err = store.complete(&SessionId::new(), None).await.unwrap_err();
    assert!(matches!(err, OdsError::Store(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_memory_pending_session_cannot_complete() {
    assert_pending_session_cannot_complete(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_pending_session_cannot_complete() {
    assert_pending_session_cannot_complete(&SqliteStore::in_memory().await.unwrap()).await;
}

async fn assert_requeue_stale<S>(store: &S)
where
    S: SessionQueue,
{
    store.create_session(buckets_job()).await.unwrap();
    let claimed = store.claim_next().await.unwrap().unwrap();

    // Nothing started before an hour ago.
    assert_eq!(store.requeue_stale(Utc::now() - Duration::hours(1)).await.unwrap(), 0);

    let requeued = store
        .requeue_stale(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(requeued, 1);

    let again = store.claim_next().await.unwrap().unwrap();
    assert_eq!(again.id, claimed.id);
}

#[tokio::test]
async fn test_memory_requeue_stale() {
    assert_requeue_stale(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_requeue_stale() {
    assert_requeue_stale(&SqliteStore::in_memory().await.unwrap()).await;
}

fn object(name: &str, size: u64, scan_id: Option<SessionId>) -> ObjectRecord {
    ObjectRecord {
        bucket: "logs".to_string(),
        name: name.to_string(),
        data: serde_json::json!({ "name": name, "size": size }),
        updated_at: Utc::now(),
        scan_id,
    }
}

async fn assert_upsert_is_idempotent<C>(catalog: &C)
where
    C: CatalogRepository,
{
    let first_scan = SessionId::new();
    let second_scan = SessionId::new();

    catalog.upsert_object(&object("a.log", 1, Some(first_scan))).await.unwrap();
    catalog.upsert_object(&object("b.log", 2, Some(first_scan))).await.unwrap();
    catalog.upsert_object(&object("a.log", 10, Some(second_scan))).await.unwrap();
    catalog.upsert_object(&object("a.log", 10, Some(second_scan))).await.unwrap();

    let objects = catalog.find_objects("logs").await.unwrap();
    assert_eq!(objects.len(), 2, "one record per natural key");

    let a = catalog.find_object("logs", "a.log").await.unwrap().unwrap();
    assert_eq!(a.data["size"], 10);
    assert_eq!(a.scan_id, Some(second_scan));

    for namespace in [NAMESPACE, NAMESPACE, "other"] {
        catalog
            .upsert_bucket(&BucketRecord {
                name: "logs".to_string(),
                namespace: namespace.to_string(),
                data: serde_json::json!({}),
                updated_at: Utc::now(),
                scan_id: None,
            })
            .await
            .unwrap();
    }
    // Same name in two namespaces is two buckets.
    assert_eq!(catalog.find_active_buckets().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_memory_upsert_is_idempotent() {
    assert_upsert_is_idempotent(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_upsert_is_idempotent() {
    assert_upsert_is_idempotent(&SqliteStore::in_memory().await.unwrap()).await;
}
