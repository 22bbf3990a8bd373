//! ods-discoverer - Listing engine for the object discovery service.
//!
//! This crate turns a page-at-a-time [`ListingBackend`](ods_traits::ListingBackend)
//! into lazy item streams. It supports:
//!
//! - Cursor-driven pagination with retries applied per page
//! - Bounded exponential backoff for transient upstream errors
//! - Partition fan-out with bounded concurrency and a bounded item buffer
//! - An S3-compatible backend (OCI Object Storage) and an in-memory backend
//!
//! # Example
//!
//! ```ignore
//! use futures::TryStreamExt;
//! use ods_discoverer::{FanOutConfig, ListOptions, list_objects, merge_partitions};
//! use ods_discoverer::s3::{S3Backend, S3Config};
//!
//! let backend = Arc::new(S3Backend::from_config(&S3Config::for_oci("ns", "us-ashburn-1")).await?);
//! let options = ListOptions::new().with_page_size(1000);
//!
//! let open = {
//!     let backend = backend.clone();
//!     move |prefix: String| list_objects(backend.clone(), "ns", "logs", Some(prefix), &options)
//! };
//!
//! let objects = merge_partitions(vec!["dev/".into(), "prod/".into()], &FanOutConfig::new(), open);
//! let count = objects.try_fold(0u64, |n, _| async move { Ok(n + 1) }).await?;
//! eprintln!("Listed {count} objects");
//! ```

pub mod list;
pub mod memory;
pub mod parallel;
pub mod retry;
pub mod s3;

pub use list::{ListOptions, list_buckets, list_objects, paginate};
pub use memory::MemoryBackend;
pub use parallel::{FanOutConfig, merge_partitions};
pub use retry::{RetryConfig, with_retry, with_retry_notify};
