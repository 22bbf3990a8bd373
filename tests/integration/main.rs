//! Integration tests for the object discovery service.
//!
//! Everything except `s3_test` runs against the in-memory listing backend and
//! both session stores (in-memory and SQLite), with no external services.
//!
//! The S3 tests need an S3-compatible endpoint such as LocalStack and are
//! marked `#[ignore]`:
//!
//! ```bash
//! LOCALSTACK_ENDPOINT=http://localhost:4566 cargo test -p integration-tests -- --ignored
//! ```

mod common;
mod listing_test;
mod queue_test;
mod s3_test;
mod worker_test;
