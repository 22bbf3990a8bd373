//! Error types and classification for the object discovery service.
//!
//! This crate provides:
//! - [`OdsError`] - Top-level error enum for all scan errors
//! - Domain-specific errors ([`ListingError`], [`StoreError`], [`ScanError`])
//! - [`ErrorCategory`] for retry decision making
//! - [`classify_error`] mapping an error onto its category

use thiserror::Error;

/// Top-level error type for the object discovery service.
#[derive(Error, Debug)]
pub enum OdsError {
    /// Upstream listing errors (object storage API)
    #[error("Listing error: {0}")]
    Listing(#[from] ListingError),

    /// Catalog or session store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Scan orchestration errors (fan-out, task execution)
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (wrapped anyhow)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised by a paginated listing call against object storage.
#[derive(Error, Debug)]
pub enum ListingError {
    /// Request was throttled (HTTP 429, SlowDown, TooManyRequests)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transient server-side failure (HTTP 5xx)
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// No response was received (timeout, dispatch or connection failure)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Namespace, bucket or prefix does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication or authorization failure
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Any other client-side rejection (HTTP 4xx)
    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    /// The upstream returned a page the lister cannot make progress with
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ListingError {
    /// Map an HTTP status and optional service error code onto a listing error.
    pub fn from_status(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();

        if status == 429
            || matches!(
                code,
                Some("SlowDown" | "TooManyRequests" | "Throttling" | "ThrottlingException")
            )
        {
            return Self::RateLimited(message);
        }

        match status {
            500..=599 => Self::Server { status, message },
            404 => Self::NotFound(message),
            401 | 403 => Self::AccessDenied(message),
            _ => Self::Client { status, message },
        }
    }
}

/// Catalog and session store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to connect to the store, or the connection was lost
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Insert raced with a concurrent writer on the same natural key
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Query or statement failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Referenced document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested status change would move a session backwards
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Document serialization failed
    #[error("Serialization failed: {0}")]
    Serialize(String),

    /// Stored document could not be decoded
    #[error("Deserialization failed: {0}")]
    Deserialize(String),

    /// A claimed session's job payload could not be decoded
    #[error("Session {session_id} has an unreadable job: {reason}")]
    UnreadableJob { session_id: String, reason: String },
}

/// Errors raised while executing a scan task.
#[derive(Error, Debug)]
pub enum ScanError {
    /// One partition of a fan-out scan failed; the others kept running
    #[error("Partition '{partition}' failed: {source}")]
    PartitionFailed {
        partition: String,
        #[source]
        source: Box<OdsError>,
    },

    /// A partition task exited without reporting completion
    #[error("Partition worker lost: {0}")]
    WorkerLost(String),

    /// Some partitions of an object listing failed
    #[error("{failed} of {total} partitions failed")]
    PartitionsFailed { failed: usize, total: usize },

    /// The session's job payload cannot be executed
    #[error("Invalid job: {0}")]
    InvalidJob(String),
}

/// Error classification for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - retry with exponential backoff
    ///
    /// Examples: HTTP 429, HTTP 503, connection reset
    Transient,

    /// Permanent error - never retry, propagate immediately
    ///
    /// Examples: bucket not found, access denied, malformed request
    Permanent,
}

/// Classifies an error to determine retry behavior.
pub fn classify_error(error: &OdsError) -> ErrorCategory {
    match error {
        OdsError::Listing(e) => classify_listing_error(e),
        OdsError::Store(e) => classify_store_error(e),
        OdsError::Scan(_) => ErrorCategory::Permanent,
        OdsError::Config(_) => ErrorCategory::Permanent,
        OdsError::Other(_) => ErrorCategory::Permanent,
    }
}

fn classify_listing_error(error: &ListingError) -> ErrorCategory {
    match error {
        ListingError::RateLimited(_) => ErrorCategory::Transient,
        ListingError::Server { .. } => ErrorCategory::Transient,
        ListingError::Unavailable(_) => ErrorCategory::Transient,
        ListingError::NotFound(_) => ErrorCategory::Permanent,
        ListingError::AccessDenied(_) => ErrorCategory::Permanent,
        ListingError::Client { .. } => ErrorCategory::Permanent,
        ListingError::InvalidResponse(_) => ErrorCategory::Permanent,
    }
}

fn classify_store_error(error: &StoreError) -> ErrorCategory {
    match error {
        StoreError::Connection(_) => ErrorCategory::Transient,
        StoreError::DuplicateKey(_) => ErrorCategory::Transient,
        StoreError::Query(_) => ErrorCategory::Permanent,
        StoreError::NotFound(_) => ErrorCategory::Permanent,
        StoreError::InvalidTransition(_) => ErrorCategory::Permanent,
        StoreError::Migration(_) => ErrorCategory::Permanent,
        StoreError::Serialize(_) => ErrorCategory::Permanent,
        StoreError::Deserialize(_) => ErrorCategory::Permanent,
        StoreError::UnreadableJob { .. } => ErrorCategory::Permanent,
    }
}

impl OdsError {
    /// Shorthand for `classify_error(self) == ErrorCategory::Transient`.
    pub fn is_transient(&self) -> bool {
        classify_error(self) == ErrorCategory::Transient
    }

    /// True when this is a duplicate-key contention error from the store.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, OdsError::Store(StoreError::DuplicateKey(_)))
    }

    /// The session a store error is attributed to, when it names one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            OdsError::Store(StoreError::UnreadableJob { session_id, .. }) => Some(session_id),
            _ => None,
        }
    }
}

/// Result type alias using OdsError.
pub type Result<T> = std::result::Result<T, OdsError>;
