//! Scan task handlers.
//!
//! One handler per [`JobKind`](ods_types::JobKind). Each handler streams
//! listing results straight into the catalog and returns the number of
//! records it upserted.

mod buckets;
mod objects;

pub use buckets::run_bucket_listing;
pub use objects::{Partition, run_object_listing};

use ods_error::{Result, StoreError};
use ods_traits::CatalogRepository;
use ods_types::{BucketRecord, ObjectRecord};
use serde::Serialize;
use tracing::debug;

/// Upsert a bucket, retrying once if the insert raced another writer.
pub async fn upsert_bucket_with_contention_retry<C>(catalog: &C, record: &BucketRecord) -> Result<()>
where
    C: CatalogRepository + ?Sized,
{
    match catalog.upsert_bucket(record).await {
        Err(e) if e.is_duplicate_key() => {
            debug!(bucket = %record.name, namespace = %record.namespace, "Upsert raced, retrying once");
            catalog.upsert_bucket(record).await
        }
        other => other,
    }
}

/// Upsert an object, retrying once if the insert raced another writer.
pub async fn upsert_object_with_contention_retry<C>(catalog: &C, record: &ObjectRecord) -> Result<()>
where
    C: CatalogRepository + ?Sized,
{
    match catalog.upsert_object(record).await {
        Err(e) if e.is_duplicate_key() => {
            debug!(bucket = %record.bucket, object = %record.name, "Upsert raced, retrying once");
            catalog.upsert_object(record).await
        }
        other => other,
    }
}

/// Serialize a listing entry into a record's metadata blob.
fn to_blob<T: Serialize>(entry: &T) -> Result<serde_json::Value> {
    serde_json::to_value(entry).map_err(|e| StoreError::Serialize(e.to_string()).into())
}
