//! Core types for the object discovery service.
//!
//! This crate provides the foundational types used throughout the system:
//! - [`Job`] / [`JobKind`] - What a scan targets and which task runs it
//! - [`ScanSession`] - A unit of claimable scan work and its lifecycle
//! - [`BucketRecord`] / [`ObjectRecord`] - Catalog documents keyed by natural key
//! - [`Page`] / [`PageRequest`] - One round trip of a paginated listing call

pub mod job;
pub mod listing;
pub mod record;
pub mod session;

pub use job::*;
pub use listing::*;
pub use record::*;
pub use session::*;
