//! Session worker loop.

use ods_discoverer::with_retry;
use ods_error::{OdsError, Result};
use ods_traits::{CatalogRepository, ListingBackend, SessionQueue};
use ods_types::{JobKind, ScanSession, SessionId};
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::WorkerConfig;
use crate::stats::{StatsSnapshot, WorkerStats};
use crate::tasks::{run_bucket_listing, run_object_listing};

/// Result of processing one claimed session.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The task finished and the session is `completed`
    Completed { id: SessionId, items: u64 },

    /// The task failed; the session stays `in_progress`
    Failed { id: SessionId, error: OdsError },
}

impl SessionOutcome {
    /// The session this outcome belongs to.
    pub fn id(&self) -> SessionId {
        match self {
            SessionOutcome::Completed { id, .. } | SessionOutcome::Failed { id, .. } => *id,
        }
    }

    /// Whether the session reached `completed`.
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed { .. })
    }
}

/// Polls the session queue and runs each claimed session to completion.
///
/// One worker is one poll loop; run several processes against the same
/// store to scale out. Exclusivity comes entirely from
/// [`SessionQueue::claim_next`].
pub struct Worker<Q: ?Sized, C: ?Sized, B: ?Sized> {
    config: WorkerConfig,
    queue: Arc<Q>,
    catalog: Arc<C>,
    backend: Arc<B>,
    stats: Arc<WorkerStats>,
}

impl<Q, C, B> Worker<Q, C, B>
where
    Q: SessionQueue + ?Sized,
    C: CatalogRepository + ?Sized,
    B: ListingBackend + ?Sized + 'static,
{
    /// Create a new worker.
    pub fn new(config: WorkerConfig, queue: Arc<Q>, catalog: Arc<C>, backend: Arc<B>) -> Self {
        Self {
            config,
            queue,
            catalog,
            backend,
            stats: Arc::new(WorkerStats::new()),
        }
    }

    /// The worker's configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Live statistics, shared with callers that report progress.
    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Run until `shutdown` is cancelled, or until the queue is empty in drain mode.
    ///
    /// Cancellation is observed between sessions and during the idle sleep;
    /// a session that is already running is allowed to finish. Failures of
    /// individual sessions and of the claim itself are logged and never end
    /// the loop.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<StatsSnapshot> {
        self.config.validate().map_err(OdsError::Config)?;

        info!(
            worker_id = %self.config.worker_id,
            idle_interval_secs = self.config.idle_interval.as_secs_f64(),
            drain = self.config.drain,
            concurrency = self.config.fan_out.concurrency,
            "Starting worker"
        );

        loop {
            if shutdown.is_cancelled() {
                info!(worker_id = %self.config.worker_id, "Shutdown requested");
                break;
            }

            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) if self.config.drain => {
                    info!(worker_id = %self.config.worker_id, "Queue drained");
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    self.stats.record_claim_error();
                    error!(worker_id = %self.config.worker_id, error = %e, "Failed to claim session");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(worker_id = %self.config.worker_id, "Shutdown requested");
                    break;
                }
                _ = sleep(self.config.idle_interval) => {}
            }
        }

        self.stats.finish();
        let snapshot = self.stats.snapshot();

        info!(
            worker_id = %self.config.worker_id,
            sessions_completed = snapshot.sessions_completed,
            sessions_failed = snapshot.sessions_failed,
            items = snapshot.items_upserted(),
            "Worker stopped"
        );

        Ok(snapshot)
    }

    /// Claim at most one session and run it.
    ///
    /// Returns `Ok(None)` when nothing is pending. Only a failing claim is
    /// returned as `Err`; a failing session is reported as
    /// [`SessionOutcome::Failed`] and left `in_progress`.
    pub async fn run_once(&self) -> Result<Option<SessionOutcome>> {
        let claimed = match self.queue.claim_next().await {
            Ok(claimed) => claimed,
            Err(error) => return self.claim_failed(error),
        };
        let Some(session) = claimed else {
            debug!(worker_id = %self.config.worker_id, "No pending session");
            return Ok(None);
        };

        self.stats.record_claimed();
        info!(
            worker_id = %self.config.worker_id,
            session_id = %session.id,
            job = %session.job.name,
            kind = session.job.kind.label(),
            "Claimed session"
        );

        let id = session.id;
        let items = match self.execute(&session).await {
            Ok(items) => items,
            Err(error) => {
                self.stats.record_failed();
                error!(
                    session_id = %id,
                    job = %session.job.name,
                    error = %error,
                    "Session failed, leaving it in progress"
                );
                return Ok(Some(SessionOutcome::Failed { id, error }));
            }
        };

        let completed = with_retry(&self.config.retry, "complete_session", || {
            self.queue.complete(&id, Some(items))
        })
        .await;

        match completed {
            Ok(()) => {
                self.stats.record_completed();
                info!(session_id = %id, items, "Session completed");
                Ok(Some(SessionOutcome::Completed { id, items }))
            }
            Err(error) => {
                self.stats.record_failed();
                error!(session_id = %id, error = %error, "Failed to mark session completed");
                Ok(Some(SessionOutcome::Failed { id, error }))
            }
        }
    }

    /// A claim that names its session was taken out of `pending` and fails
    /// that session. Any other claim error goes back to the caller.
    fn claim_failed(&self, error: OdsError) -> Result<Option<SessionOutcome>> {
        let Some(Ok(id)) = error.session_id().map(SessionId::from_str) else {
            return Err(error);
        };

        self.stats.record_claimed();
        self.stats.record_failed();
        error!(
            worker_id = %self.config.worker_id,
            session_id = %id,
            error = %error,
            "Claimed session cannot be run, leaving it in progress"
        );
        Ok(Some(SessionOutcome::Failed { id, error }))
    }

    async fn execute(&self, session: &ScanSession) -> Result<u64> {
        match &session.job.kind {
            JobKind::ListBuckets => {
                run_bucket_listing(
                    session,
                    self.catalog.as_ref(),
                    self.backend.clone(),
                    &self.config,
                    &self.stats,
                )
                .await
            }
            JobKind::ListObjects { bucket, prefixes } => {
                run_object_listing(
                    session,
                    bucket.as_deref(),
                    prefixes,
                    self.catalog.as_ref(),
                    self.backend.clone(),
                    &self.config,
                    &self.stats,
                )
                .await
            }
        }
    }
}
