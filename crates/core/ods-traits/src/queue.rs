//! Scan session queue trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ods_error::Result;
use ods_types::{Job, ScanSession, SessionId};

/// Trait for scan session stores.
///
/// Implementations include:
/// - In-memory store (for testing/development)
/// - SQLite store (production)
///
/// # Session Flow
///
/// 1. The scheduler calls [`create_session`](SessionQueue::create_session)
/// 2. Workers call [`claim_next`](SessionQueue::claim_next) to take ownership
/// 3. After the task finishes, the worker calls [`complete`](SessionQueue::complete)
///
/// A session whose task fails stays `in_progress`; there is no failed state.
#[async_trait]
pub trait SessionQueue: Send + Sync {
    /// Creates a `pending` session for `job`.
    async fn create_session(&self, job: Job) -> Result<ScanSession>;

    /// Atomically moves one `pending` session to `in_progress`.
    ///
    /// Under concurrent callers each pending session is returned to at most
    /// one of them. Returns `Ok(None)` when nothing is pending. The returned
    /// session reflects the claim (`in_progress`, `started_at` set).
    async fn claim_next(&self) -> Result<Option<ScanSession>>;

    /// Marks a session `completed`, recording `completed_at` and the item count.
    ///
    /// Idempotent: repeating the call re-sets the same terminal fields.
    async fn complete(&self, id: &SessionId, object_count: Option<u64>) -> Result<()>;

    /// Reads a session back by id.
    async fn get_session(&self, id: &SessionId) -> Result<Option<ScanSession>>;

    /// Returns `in_progress` sessions started before `older_than` to `pending`.
    ///
    /// Manual recovery hook for sessions left behind by a crashed worker; the
    /// worker loop never calls it. Returns the number of sessions requeued.
    async fn requeue_stale(&self, older_than: DateTime<Utc>) -> Result<u64>;
}
