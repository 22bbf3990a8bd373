//! Bucket listing task.

use chrono::Utc;
use futures::TryStreamExt;
use ods_discoverer::list_buckets;
use ods_error::Result;
use ods_traits::{CatalogRepository, ListingBackend};
use ods_types::{BucketRecord, ScanSession};
use std::sync::Arc;
use tracing::{debug, info};

use super::{to_blob, upsert_bucket_with_contention_retry};
use crate::config::WorkerConfig;
use crate::stats::WorkerStats;

/// List every bucket in the job's namespace and upsert each one.
///
/// Returns the number of buckets upserted.
pub async fn run_bucket_listing<C, B>(
    session: &ScanSession,
    catalog: &C,
    backend: Arc<B>,
    config: &WorkerConfig,
    stats: &WorkerStats,
) -> Result<u64>
where
    C: CatalogRepository + ?Sized,
    B: ListingBackend + ?Sized + 'static,
{
    let namespace = session.job.oci_namespace.clone();
    let options = config
        .list_options()
        .with_region(session.job.oci_region.clone());
    let mut buckets = list_buckets(backend, namespace.clone(), &options);
    let mut upserted = 0u64;

    while let Some(entry) = buckets.try_next().await? {
        let record = BucketRecord {
            name: entry.name.clone(),
            namespace: entry.namespace.clone(),
            data: to_blob(&entry)?,
            updated_at: Utc::now(),
            scan_id: Some(session.id),
        };
        upsert_bucket_with_contention_retry(catalog, &record).await?;
        stats.record_bucket();
        upserted += 1;

        debug!(session_id = %session.id, bucket = %record.name, "Upserted bucket");
    }

    info!(
        session_id = %session.id,
        namespace = %namespace,
        items = upserted,
        "Bucket listing complete"
    );
    Ok(upserted)
}
