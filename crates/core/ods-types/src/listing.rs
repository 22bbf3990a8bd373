//! Types exchanged with a paginated listing backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One call of a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Object storage namespace
    pub namespace: String,

    /// Region of the namespace; `None` uses the backend's default
    pub region: Option<String>,

    /// Container being listed (the bucket, for object listings)
    pub container: Option<String>,

    /// Name prefix restricting the listing
    pub prefix: Option<String>,

    /// Continuation cursor from the previous page
    pub cursor: Option<String>,

    /// Requested page size; the backend may return fewer items
    pub page_size: Option<u32>,
}

/// One page returned by the listing backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page, possibly none
    pub items: Vec<T>,

    /// Cursor for the next page; `None` (or empty) when the listing is done
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A page with a continuation cursor.
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// The final page of a listing.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// A bucket as reported by the listing backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
    /// Bucket name
    pub name: String,

    /// Namespace the bucket lives in
    pub namespace: String,

    /// Region, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Creation timestamp, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<DateTime<Utc>>,

    /// Entity tag, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// An object as reported by the listing backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Object name (full key)
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// Entity tag, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Content type, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Creation timestamp, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<DateTime<Utc>>,

    /// Last modification timestamp, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_modified: Option<DateTime<Utc>>,
}

impl ObjectEntry {
    /// An entry with only a name and size.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            etag: None,
            content_type: None,
            time_created: None,
            time_modified: None,
        }
    }

    /// Directory markers and empty keys carry no object data.
    pub fn is_directory_marker(&self) -> bool {
        self.name.is_empty() || self.name.ends_with('/')
    }
}
