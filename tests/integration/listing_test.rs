//! Pagination, retry and fan-out behaviour over the in-memory backend.

use crate::common::{NAMESPACE, seeded_backend};
use futures::{StreamExt, TryStreamExt};
use ods_discoverer::{
    FanOutConfig, ListOptions, MemoryBackend, RetryConfig, list_buckets, list_objects,
    merge_partitions,
};
use ods_error::{ListingError, OdsError, ScanError};
use ods_types::ObjectEntry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_pagination_yields_every_item_once() {
    let backend = Arc::new(MemoryBackend::new().with_page_size(2).with_objects(
        "logs",
        (0..6).map(|i| ObjectEntry::new(format!("part-{i}"), i)),
    ));

    let names: Vec<String> = list_objects(backend.clone(), NAMESPACE, "logs", None, &ListOptions::new())
        .map_ok(|o| o.name)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(
        names,
        vec!["part-0", "part-1", "part-2", "part-3", "part-4", "part-5"]
    );
    assert_eq!(backend.page_calls(), 3);
}

#[tokio::test]
async fn test_directory_markers_skipped() {
    let names: Vec<String> = list_objects(
        Arc::new(seeded_backend()),
        NAMESPACE,
        "logs",
        Some("dev/".to_string()),
        &ListOptions::new(),
    )
    .map_ok(|o| o.name)
    .try_collect()
    .await
    .unwrap();

    assert_eq!(names.len(), 4);
    assert!(names.iter().all(|n| !n.ends_with('/')));
}

#[tokio::test]
async fn test_bucket_listing_scoped_to_namespace() {
    let backend = Arc::new(seeded_backend().with_bucket("someone-else", "private"));

    let names: Vec<String> = list_buckets(backend, NAMESPACE, &ListOptions::new())
        .map_ok(|b| b.name)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(names, vec!["images", "logs"]);
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig::new()
        .with_max_retries(max_retries)
        .with_base_delay_ms(100)
        .with_factor(2.0)
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_retried_per_page() {
    let backend = Arc::new(MemoryBackend::new().with_page_size(2).with_objects(
        "logs",
        (0..4).map(|i| ObjectEntry::new(format!("f{i}"), 1)),
    ));
    let options = ListOptions::new().with_retry(fast_retry(3));

    let mut objects = list_objects(backend.clone(), NAMESPACE, "logs", None, &options);

    // First page arrives before anything fails.
    assert_eq!(objects.next().await.unwrap().unwrap().name, "f0");
    assert_eq!(objects.next().await.unwrap().unwrap().name, "f1");

    backend.inject_error(ListingError::RateLimited("slow down".to_string()));
    backend.inject_error(ListingError::Server {
        status: 503,
        message: "unavailable".to_string(),
    });

    let start = tokio::time::Instant::now();
    let rest: Vec<ObjectEntry> = objects.try_collect().await.unwrap();

    assert_eq!(rest.len(), 2);
    // 1 + 2 page calls without errors, 2 failed attempts on page two
    assert_eq!(backend.page_calls(), 4);
    // 100ms then 200ms of backoff
    assert_eq!(start.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_surfaces_last_error() {
    let backend = Arc::new(MemoryBackend::new().with_objects("logs", [ObjectEntry::new("a", 1)]));
    for _ in 0..4 {
        backend.inject_error(ListingError::Server {
            status: 500,
            message: "boom".to_string(),
        });
    }
    let options = ListOptions::new().with_retry(fast_retry(3));

    let err = list_objects(backend.clone(), NAMESPACE, "logs", None, &options)
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();

    assert!(matches!(err, OdsError::Listing(ListingError::Server { status: 500, .. })));
    assert_eq!(backend.page_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_not_retried() {
    let backend = Arc::new(MemoryBackend::new().with_objects("logs", [ObjectEntry::new("a", 1)]));
    backend.inject_error(ListingError::Client {
        status: 400,
        message: "bad request".to_string(),
    });
    let options = ListOptions::new().with_retry(fast_retry(5));

    let start = tokio::time::Instant::now();
    let err = list_objects(backend.clone(), NAMESPACE, "logs", None, &options)
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();

    assert!(!err.is_transient());
    assert_eq!(backend.page_calls(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

fn wide_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new().with_page_size(4).with_objects(
        "data",
        (0..5).flat_map(|p| (0..6).map(move |i| ObjectEntry::new(format!("p{p}/obj-{i}"), 1))),
    ))
}

fn open_prefix(
    backend: Arc<MemoryBackend>,
) -> impl Fn(String) -> futures::stream::BoxStream<'static, ods_error::Result<ObjectEntry>> + Send + Sync + 'static
{
    move |prefix: String| {
        list_objects(backend.clone(), NAMESPACE, "data", Some(prefix), &ListOptions::new())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fan_out_conserves_items() {
    let prefixes: Vec<String> = (0..5).map(|p| format!("p{p}/")).collect();
    let config = FanOutConfig::new().with_concurrency(3).with_buffer_capacity(2);

    let names: Vec<String> = merge_partitions(prefixes, &config, open_prefix(wide_backend()))
        .map_ok(|o| o.name)
        .try_collect()
        .await
        .unwrap();

    let unique: HashSet<_> = names.iter().cloned().collect();
    assert_eq!(names.len(), 30);
    assert_eq!(unique.len(), 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fan_out_failed_partition_does_not_stop_others() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_page_size(4)
            .with_objects(
                "data",
                (0..5).flat_map(|p| (0..6).map(move |i| ObjectEntry::new(format!("p{p}/obj-{i}"), 1))),
            )
            .with_denied_prefix("data", "p2/"),
    );
    let prefixes: Vec<String> = (0..5).map(|p| format!("p{p}/")).collect();
    let config = FanOutConfig::new().with_concurrency(2);

    let results: Vec<_> = merge_partitions(prefixes, &config, open_prefix(backend))
        .collect()
        .await;

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let failed: Vec<_> = results
        .iter()
        .filter_map(|r| match r {
            Err(OdsError::Scan(ScanError::PartitionFailed { partition, .. })) => Some(partition.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(ok, 24);
    assert_eq!(failed, vec!["p2/".to_string()]);
}
