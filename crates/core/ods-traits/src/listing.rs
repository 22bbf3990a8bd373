//! Upstream listing backend trait.

use async_trait::async_trait;
use ods_error::Result;
use ods_types::{BucketEntry, ObjectEntry, Page, PageRequest};

/// A paginated object storage listing API.
///
/// Each method performs exactly one upstream call and returns one page.
/// Cursor handling across pages is the lister's job, not the backend's.
#[async_trait]
pub trait ListingBackend: Send + Sync {
    /// Lists one page of buckets in `request.namespace`.
    async fn list_bucket_page(&self, request: &PageRequest) -> Result<Page<BucketEntry>>;

    /// Lists one page of objects in bucket `request.container`.
    async fn list_object_page(&self, request: &PageRequest) -> Result<Page<ObjectEntry>>;
}
