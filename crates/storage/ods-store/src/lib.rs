//! ods-store - Session queue and catalog persistence for the object discovery service.
//!
//! Both stores implement [`SessionQueue`](ods_traits::SessionQueue) and
//! [`CatalogRepository`](ods_traits::CatalogRepository):
//!
//! - [`MemoryStore`]: process-local, for tests and single-process development
//! - [`SqliteStore`]: shared SQLite database, safe for many worker processes
//!
//! # Example
//!
//! ```ignore
//! use ods_store::SqliteStore;
//! use ods_traits::SessionQueue;
//!
//! let store = SqliteStore::connect("sqlite://ods.db").await?;
//! if let Some(session) = store.claim_next().await? {
//!     // ... run the task ...
//!     store.complete(&session.id, Some(42)).await?;
//! }
//! ```

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, SqliteStoreConfig};
