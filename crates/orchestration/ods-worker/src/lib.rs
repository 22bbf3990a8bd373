//! ods-worker - Session worker for the object discovery service.
//!
//! A worker polls the shared session queue, claims one pending session at a
//! time, runs the task named by its job (bucket listing or object listing)
//! and marks the session completed. Listing results stream straight into
//! the catalog as idempotent upserts.
//!
//! # Example
//!
//! ```ignore
//! use ods_worker::{Worker, WorkerConfig};
//! use ods_store::SqliteStore;
//! use ods_discoverer::s3::{S3Backend, S3Config};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = Arc::new(SqliteStore::connect("sqlite://ods.db").await?);
//! let backend = Arc::new(S3Backend::from_config(&S3Config::for_oci("ns", "us-ashburn-1")).await?);
//!
//! let worker = Worker::new(WorkerConfig::new(), store.clone(), store, backend);
//! let stats = worker.run(CancellationToken::new()).await?;
//! eprintln!("Completed {} sessions", stats.sessions_completed);
//! ```

pub mod config;
pub mod stats;
pub mod tasks;
pub mod worker;

pub use config::WorkerConfig;
pub use stats::{StatsSnapshot, WorkerStats};
pub use worker::{SessionOutcome, Worker};
