//! End-to-end worker runs against both store backends.

use crate::common::{SqliteFile, buckets_job, objects_job, seeded_backend};
use ods_discoverer::{FanOutConfig, MemoryBackend};
use ods_store::{MemoryStore, SqliteStore};
use ods_traits::{CatalogRepository, SessionQueue};
use ods_types::SessionStatus;
use ods_worker::{Worker, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config(worker_id: &str) -> WorkerConfig {
    WorkerConfig::new()
        .with_worker_id(worker_id)
        .with_idle_interval(Duration::from_millis(10))
        .with_drain(true)
        .with_fan_out(FanOutConfig::new().with_concurrency(2))
}

async fn assert_objects_scan_completes<S>(store: Arc<S>)
where
    S: SessionQueue + CatalogRepository + 'static,
{
    let session = store
        .create_session(objects_job(Some("logs"), &["dev/", "prod/"]))
        .await
        .unwrap();
    let worker = Worker::new(config("e2e"), store.clone(), store.clone(), Arc::new(seeded_backend()));

    let stats = worker.run(CancellationToken::new()).await.unwrap();
    assert_eq!(stats.sessions_completed, 1);
    assert_eq!(stats.objects_upserted, 7);

    let done = store.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
    assert_eq!(done.object_count, Some(7));

    let objects = store.find_objects("logs").await.unwrap();
    assert_eq!(objects.len(), 7);
    assert!(objects.iter().all(|o| o.scan_id == Some(session.id)));
    assert!(objects.iter().all(|o| !o.name.ends_with('/')));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_objects_scan_completes() {
    assert_objects_scan_completes(Arc::new(MemoryStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_objects_scan_completes() {
    assert_objects_scan_completes(Arc::new(SqliteStore::in_memory().await.unwrap())).await;
}

async fn assert_bucket_scan_feeds_object_scan<S>(store: Arc<S>)
where
    S: SessionQueue + CatalogRepository + 'static,
{
    let backend = Arc::new(seeded_backend());

    store.create_session(buckets_job()).await.unwrap();
    let worker = Worker::new(config("buckets"), store.clone(), store.clone(), backend.clone());
    let stats = worker.run(CancellationToken::new()).await.unwrap();
    assert_eq!(stats.buckets_upserted, 2);

    // No bucket on the job: every catalogued bucket is scanned.
    let session = store.create_session(objects_job(None, &[])).await.unwrap();
    let worker = Worker::new(config("objects"), store.clone(), store.clone(), backend);
    let stats = worker.run(CancellationToken::new()).await.unwrap();
    assert_eq!(stats.objects_upserted, 9);

    let done = store.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(done.object_count, Some(9));
    assert_eq!(store.find_objects("images").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_memory_bucket_scan_feeds_object_scan() {
    assert_bucket_scan_feeds_object_scan(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn test_sqlite_bucket_scan_feeds_object_scan() {
    assert_bucket_scan_feeds_object_scan(Arc::new(SqliteStore::in_memory().await.unwrap())).await;
}

#[tokio::test]
async fn test_rescan_does_not_duplicate_catalog() {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let backend = Arc::new(seeded_backend());

    for _ in 0..3 {
        store
            .create_session(objects_job(Some("logs"), &["dev/", "prod/"]))
            .await
            .unwrap();
    }
    let worker = Worker::new(config("rescan"), store.clone(), store.clone(), backend);
    let stats = worker.run(CancellationToken::new()).await.unwrap();

    assert_eq!(stats.sessions_completed, 3);
    assert_eq!(stats.objects_upserted, 21);
    assert_eq!(store.find_objects("logs").await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_failed_partition_leaves_session_in_progress() {
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(seeded_backend().with_denied_prefix("logs", "prod/"));
    let session = store
        .create_session(objects_job(Some("logs"), &["dev/", "prod/"]))
        .await
        .unwrap();

    let worker = Worker::new(config("partial"), store.clone(), store.clone(), backend);
    let stats = worker.run(CancellationToken::new()).await.unwrap();

    assert_eq!(stats.sessions_failed, 1);
    assert_eq!(stats.partitions_failed, 1);
    // Healthy partition was still catalogued.
    assert_eq!(store.object_count(), 4);

    let stuck = store.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stuck.status, SessionStatus::InProgress);
    assert!(stuck.completed_at.is_none());
}

#[tokio::test]
async fn test_missing_bucket_fails_session() {
    let store = Arc::new(MemoryStore::new());
    let session = store
        .create_session(objects_job(Some("does-not-exist"), &[]))
        .await
        .unwrap();

    let worker = Worker::new(config("missing"), store.clone(), store.clone(), Arc::new(MemoryBackend::new()));
    let stats = worker.run(CancellationToken::new()).await.unwrap();

    assert_eq!(stats.sessions_failed, 1);
    assert_eq!(
        store.get_session(&session.id).await.unwrap().unwrap().status,
        SessionStatus::InProgress
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_competing_workers_share_one_database() {
    let file = SqliteFile::new();
    let seed = file.connect().await;
    let mut ids = Vec::new();
    for _ in 0..12 {
        ids.push(seed.create_session(buckets_job()).await.unwrap().id);
    }

    let backend = Arc::new(seeded_backend());
    let mut handles = Vec::new();
    for i in 0..3 {
        let store = Arc::new(file.connect().await);
        let worker = Worker::new(config(&format!("w{i}")), store.clone(), store, backend.clone());
        handles.push(tokio::spawn(async move { worker.run(CancellationToken::new()).await }));
    }

    let mut claimed = 0;
    for handle in handles {
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.sessions_failed, 0);
        claimed += stats.sessions_claimed;
    }

    assert_eq!(claimed, 12, "each session claimed by exactly one worker");
    for id in ids {
        let session = seed.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.object_count, Some(2));
    }
    assert_eq!(seed.find_active_buckets().await.unwrap().len(), 2);
}
