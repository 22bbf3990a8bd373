//! Catalog documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// A catalogued bucket, keyed by `(name, namespace)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRecord {
    /// Bucket name
    pub name: String,

    /// Object storage namespace
    pub namespace: String,

    /// Provider-supplied metadata blob
    pub data: serde_json::Value,

    /// When a scan last wrote this record
    pub updated_at: DateTime<Utc>,

    /// Session that last wrote this record
    pub scan_id: Option<SessionId>,
}

/// A catalogued object, keyed by `(bucket, name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Containing bucket
    pub bucket: String,

    /// Object name (full key within the bucket)
    pub name: String,

    /// Metadata blob (size, etag, content type, timestamps)
    pub data: serde_json::Value,

    /// When a scan last wrote this record
    pub updated_at: DateTime<Utc>,

    /// Session that last wrote this record
    pub scan_id: Option<SessionId>,
}
