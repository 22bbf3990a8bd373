//! Core traits for the object discovery service.
//!
//! This crate defines the seams the worker engine is built against:
//! - [`SessionQueue`] - Scan session lifecycle with atomic claim
//! - [`CatalogRepository`] - Idempotent bucket/object record storage
//! - [`ListingBackend`] - One page of an upstream listing call

pub mod catalog;
pub mod listing;
pub mod queue;

pub use catalog::*;
pub use listing::*;
pub use queue::*;
