//! Catalog repository trait.

use async_trait::async_trait;
use ods_error::Result;
use ods_types::{BucketRecord, ObjectRecord};

/// Persistence boundary for catalogued buckets and objects.
///
/// Every write is an upsert on the record's natural key, so concurrent
/// writers and repeated scans converge on the same stored state.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Inserts or replaces the bucket keyed by `(name, namespace)`.
    async fn upsert_bucket(&self, record: &BucketRecord) -> Result<()>;

    /// Inserts or replaces the object keyed by `(bucket, name)`.
    async fn upsert_object(&self, record: &ObjectRecord) -> Result<()>;

    /// All known buckets. Filtering by namespace or lifecycle is up to the caller.
    async fn find_active_buckets(&self) -> Result<Vec<BucketRecord>>;

    /// Looks up one object by natural key.
    async fn find_object(&self, bucket: &str, name: &str) -> Result<Option<ObjectRecord>>;

    /// All objects catalogued for `bucket`, ordered by name.
    async fn find_objects(&self, bucket: &str) -> Result<Vec<ObjectRecord>>;
}
