//! Object listing task, fanned out over bucket and prefix partitions.

use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use ods_discoverer::{list_objects, merge_partitions};
use ods_error::{OdsError, Result, ScanError};
use ods_traits::{CatalogRepository, ListingBackend};
use ods_types::{ObjectRecord, ScanSession};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{to_blob, upsert_object_with_contention_retry};
use crate::config::WorkerConfig;
use crate::stats::WorkerStats;

/// One independently listed slice of an object scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Bucket to list
    pub bucket: String,

    /// Prefix within the bucket; empty lists the whole bucket
    pub prefix: String,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.prefix)
    }
}

/// Expand target buckets and prefixes into partitions.
///
/// No prefixes means the whole bucket, listed as a single partition.
pub fn partitions(buckets: &[String], prefixes: &[String]) -> Vec<Partition> {
    let prefixes: Vec<&str> = if prefixes.is_empty() {
        vec![""]
    } else {
        prefixes.iter().map(String::as_str).collect()
    };

    buckets
        .iter()
        .flat_map(|bucket| {
            prefixes.iter().map(move |prefix| Partition {
                bucket: bucket.clone(),
                prefix: (*prefix).to_string(),
            })
        })
        .collect()
}

/// List objects across every partition of the job and upsert each one.
///
/// `bucket: None` scans every catalogued bucket of the job's namespace.
/// With `continue_on_error` a failed partition is logged and the others
/// are drained before the task fails with [`ScanError::PartitionsFailed`];
/// otherwise the first partition failure aborts the task.
///
/// Returns the number of objects upserted.
pub async fn run_object_listing<C, B>(
    session: &ScanSession,
    bucket: Option<&str>,
    prefixes: &[String],
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

    let buckets: Vec<String> = match bucket {
        Some(bucket) => vec![bucket.to_string()],
        None => catalog
            .find_active_buckets()
            .await?
            .into_iter()
            .filter(|b| b.namespace == namespace)
            .map(|b| b.name)
            .collect(),
    };

    if buckets.is_empty() {
        warn!(session_id = %session.id, namespace = %namespace, "No buckets to list");
        return Ok(0);
    }

    let partitions = partitions(&buckets, prefixes);
    let total = partitions.len();
    info!(
        session_id = %session.id,
        buckets = buckets.len(),
        partitions = total,
        concurrency = config.fan_out.concurrency,
        "Starting object listing"
    );

    let options = config
        .list_options()
        .with_region(session.job.oci_region.clone());
    let open = move |partition: Partition| {
        let bucket = partition.bucket.clone();
        list_objects(
            backend.clone(),
            namespace.clone(),
            partition.bucket,
            Some(partition.prefix),
            &options,
        )
        .map_ok(move |entry| (bucket.clone(), entry))
        .boxed()
    };

    let mut objects = merge_partitions(partitions, &config.fan_out, open);
    let mut upserted = 0u64;
    let mut failed = 0usize;

    while let Some(item) = objects.next().await {
        let (bucket, entry) = match item {
            Ok(listed) => listed,
            Err(OdsError::Scan(ScanError::PartitionFailed { partition, source }))
                if config.fan_out.continue_on_error =>
            {
                failed += 1;
                stats.record_partition_failure();
                warn!(
                    session_id = %session.id,
                    partition = %partition,
                    error = %source,
                    "Partition failed, continuing with the rest"
                );
                continue;
            }
            Err(e) => {
                if matches!(e, OdsError::Scan(ScanError::PartitionFailed { .. })) {
                    stats.record_partition_failure();
                }
                return Err(e);
            }
        };

        let record = ObjectRecord {
            bucket,
            name: entry.name.clone(),
            data: to_blob(&entry)?,
            updated_at: Utc::now(),
            scan_id: Some(session.id),
        };
        upsert_object_with_contention_retry(catalog, &record).await?;
        stats.record_object();
        upserted += 1;

        debug!(session_id = %session.id, bucket = %record.bucket, object = %record.name, "Upserted object");
    }

    if failed > 0 {
        return Err(ScanError::PartitionsFailed { failed, total }.into());
    }

    info!(
        session_id = %session.id,
        partitions = total,
        items = upserted,
        "Object listing complete"
    );
    Ok(upserted)
}
