//! Listing and worker runs against an S3-compatible endpoint (LocalStack).

use crate::common::{LocalStackTestContext, NAMESPACE, objects_job};
use futures::TryStreamExt;
use ods_discoverer::s3::{S3Backend, S3Config};
use ods_discoverer::{FanOutConfig, ListOptions, list_buckets, list_objects};
use ods_store::SqliteStore;
use ods_traits::{CatalogRepository, SessionQueue};
use ods_types::SessionStatus;
use ods_worker::{Worker, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn backend(ctx: &LocalStackTestContext) -> Arc<S3Backend> {
    let config = S3Config::default()
        .with_region(&ctx.region)
        .with_endpoint(&ctx.endpoint)
        .with_credentials("test", "test");
    Arc::new(S3Backend::from_config(&config).await.unwrap())
}

async fn seed_bucket(ctx: &LocalStackTestContext, bucket: &str, keys: &[&str]) {
    ctx.create_bucket(bucket).await.unwrap();
    for key in keys {
        ctx.put_object(bucket, key, b"{}").await.unwrap();
    }
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_s3_object_listing_paginates() {
    let ctx = LocalStackTestContext::new().await;
    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "ods-it-paginate";
    let keys: Vec<String> = (0..7).map(|i| format!("data/part-{i:02}.json")).collect();
    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    seed_bucket(&ctx, bucket, &key_refs).await;
    ctx.put_object(bucket, "data/", b"").await.unwrap();

    let options = ListOptions::new().with_page_size(3);
    let names: Vec<String> = list_objects(
        backend(&ctx).await,
        NAMESPACE,
        bucket,
        Some("data/".to_string()),
        &options,
    )
    .map_ok(|o| o.name)
    .try_collect()
    .await
    .unwrap();

    assert_eq!(names, keys);
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_s3_bucket_listing_includes_created_bucket() {
    let ctx = LocalStackTestContext::new().await;
    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    ctx.create_bucket("ods-it-buckets").await.unwrap();

    let buckets: Vec<_> = list_buckets(backend(&ctx).await, NAMESPACE, &ListOptions::new())
        .try_collect()
        .await
        .unwrap();

    assert!(buckets.iter().any(|b| b.name == "ods-it-buckets"));
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_s3_worker_catalogs_prefixes() {
    let ctx = LocalStackTestContext::new().await;
    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let bucket = "ods-it-worker";
    seed_bucket(
        &ctx,
        bucket,
        &["dev/a.log", "dev/b.log", "dev/c.log", "prod/a.log", "prod/b.log"],
    )
    .await;

    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let session = store
        .create_session(objects_job(Some(bucket), &["dev/", "prod/"]))
        .await
        .unwrap();

    let config = WorkerConfig::new()
        .with_worker_id("s3-it")
        .with_idle_interval(Duration::from_millis(10))
        .with_drain(true)
        .with_page_size(2)
        .with_fan_out(FanOutConfig::new().with_concurrency(2));
    let worker = Worker::new(config, store.clone(), store.clone(), backend(&ctx).await);

    let stats = worker.run(CancellationToken::new()).await.unwrap();
    assert_eq!(stats.objects_upserted, 5);

    let done = store.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
    assert_eq!(done.object_count, Some(5));

    let stored = store.find_object(bucket, "prod/b.log").await.unwrap().unwrap();
    assert_eq!(stored.data["size"], 2);
}
