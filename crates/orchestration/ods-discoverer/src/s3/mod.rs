//! S3-compatible listing backend.
//!
//! OCI Object Storage exposes an Amazon S3 compatibility API at
//! `https://{namespace}.compat.objectstorage.{region}.oraclecloud.com`.
//! This module provides:
//! - Client configuration targeting that endpoint (or any custom one)
//! - A [`ListingBackend`](ods_traits::ListingBackend) over `ListBuckets` and `ListObjectsV2`

mod backend;
mod client;

pub use backend::S3Backend;
pub use client::{S3Config, create_s3_client, oci_compat_endpoint};
