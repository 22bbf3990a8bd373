//! In-memory store for testing and single-process development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ods_error::{Result, StoreError};
use ods_traits::{CatalogRepository, SessionQueue};
use ods_types::{BucketRecord, Job, ObjectRecord, ScanSession, SessionId, SessionStatus};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::debug;

/// Process-local store backing both the session queue and the catalog.
///
/// Every operation takes the lock exactly once, so `claim_next` is a single
/// indivisible find-and-update just like the SQLite implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Sessions in creation order
    sessions: Vec<ScanSession>,

    /// Buckets keyed by (namespace, name)
    buckets: BTreeMap<(String, String), BucketRecord>,

    /// Objects keyed by (bucket, name)
    objects: BTreeMap<(String, String), ObjectRecord>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of catalogued objects across all buckets.
    pub fn object_count(&self) -> usize {
        self.inner.lock().objects.len()
    }

    /// Number of sessions currently in `status`.
    pub fn count_sessions(&self, status: SessionStatus) -> usize {
        self.inner
            .lock()
            .sessions
            .iter()
            .filter(|s| s.status == status)
            .count()
    }
}

#[async_trait]
impl SessionQueue for MemoryStore {
    async fn create_session(&self, job: Job) -> Result<ScanSession> {
        let session = ScanSession::pending(job);
        self.inner.lock().sessions.push(session.clone());
        debug!(session_id = %session.id, job = %session.job.name, "Created session");
        Ok(session)
    }

    async fn claim_next(&self) -> Result<Option<ScanSession>> {
        let mut inner = self.inner.lock();

        let Some(session) = inner
            .sessions
            .iter_mut()
            .find(|s| s.status == SessionStatus::Pending)
        else {
            return Ok(None);
        };

        session.status = SessionStatus::InProgress;
        session.started_at = Some(Utc::now());
        Ok(Some(session.clone()))
    }

    async fn complete(&self, id: &SessionId, object_count: Option<u64>) -> Result<()> {
        let mut inner = self.inner.lock();

        let session = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == *id)
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;

        if session.status == SessionStatus::Pending {
            return Err(StoreError::InvalidTransition(format!(
                "session {id} was never claimed"
            ))
            .into());
        }

        session.status = SessionStatus::Completed;
        session.completed_at = Some(Utc::now());
        if object_count.is_some() {
            session.object_count = object_count;
        }
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<ScanSession>> {
        let inner = self.inner.lock();
        Ok(inner.sessions.iter().find(|s| s.id == *id).cloned())
    }

    async fn requeue_stale(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock();
        let mut requeued = 0;

        for session in inner.sessions.iter_mut() {
            let stale = session.status == SessionStatus::InProgress
                && session.started_at.is_some_and(|t| t < older_than);
            if stale {
                session.status = SessionStatus::Pending;
                session.started_at = None;
                requeued += 1;
            }
        }

        Ok(requeued)
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn upsert_bucket(&self, record: &BucketRecord) -> Result<()> {
        let key = (record.namespace.clone(), record.name.clone());
        self.inner.lock().buckets.insert(key, record.clone());
        Ok(())
    }

    async fn upsert_object(&self, record: &ObjectRecord) -> Result<()> {
        let key = (record.bucket.clone(), record.name.clone());
        self.inner.lock().objects.insert(key, record.clone());
        Ok(())
    }

    async fn find_active_buckets(&self) -> Result<Vec<BucketRecord>> {
        Ok(self.inner.lock().buckets.values().cloned().collect())
    }

    async fn find_object(&self, bucket: &str, name: &str) -> Result<Option<ObjectRecord>> {
        let key = (bucket.to_string(), name.to_string());
        Ok(self.inner.lock().objects.get(&key).cloned())
    }

    async fn find_objects(&self, bucket: &str) -> Result<Vec<ObjectRecord>> {
        let inner = self.inner.lock();
        Ok(inner
            .objects
            .range((bucket.to_string(), String::new())..)
            .take_while(|((b, _), _)| b == bucket)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
