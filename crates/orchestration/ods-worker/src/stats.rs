//! Statistics for worker runs.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected during a worker run.
///
/// Task handlers update these while items stream through, so every counter
/// is an atomic and the worker can be shared behind `&self`.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// When the run started
    started_at: Option<DateTime<Utc>>,

    /// When the run stopped
    completed_at: Mutex<Option<DateTime<Utc>>>,

    /// Sessions claimed from the queue
    sessions_claimed: AtomicU64,

    /// Sessions marked completed
    sessions_completed: AtomicU64,

    /// Sessions whose task failed (left in progress)
    sessions_failed: AtomicU64,

    /// Bucket records upserted
    buckets_upserted: AtomicU64,

    /// Object records upserted
    objects_upserted: AtomicU64,

    /// Partitions of object listings that failed
    partitions_failed: AtomicU64,

    /// Failed claim attempts against the queue
    claim_errors: AtomicU64,
}

impl WorkerStats {
    /// Create a new stats tracker with the current time as start time.
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Mark the run as finished with the current time.
    pub fn finish(&self) {
        *self.completed_at.lock() = Some(Utc::now());
    }

    /// Record a claimed session.
    pub fn record_claimed(&self) {
        self.sessions_claimed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed session.
    pub fn record_completed(&self) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed session.
    pub fn record_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upserted bucket.
    pub fn record_bucket(&self) {
        self.buckets_upserted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upserted object.
    pub fn record_object(&self) {
        self.objects_upserted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed partition.
    pub fn record_partition_failure(&self) {
        self.partitions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed claim attempt.
    pub fn record_claim_error(&self) {
        self.claim_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of sessions claimed.
    pub fn sessions_claimed(&self) -> u64 {
        self.sessions_claimed.load(Ordering::Relaxed)
    }

    /// Get the number of sessions completed.
    pub fn sessions_completed(&self) -> u64 {
        self.sessions_completed.load(Ordering::Relaxed)
    }

    /// Get the number of sessions failed.
    pub fn sessions_failed(&self) -> u64 {
        self.sessions_failed.load(Ordering::Relaxed)
    }

    /// Get the number of buckets upserted.
    pub fn buckets_upserted(&self) -> u64 {
        self.buckets_upserted.load(Ordering::Relaxed)
    }

    /// Get the number of objects upserted.
    pub fn objects_upserted(&self) -> u64 {
        self.objects_upserted.load(Ordering::Relaxed)
    }

    /// Get the number of partitions failed.
    pub fn partitions_failed(&self) -> u64 {
        self.partitions_failed.load(Ordering::Relaxed)
    }

    /// Get the number of claim errors.
    pub fn claim_errors(&self) -> u64 {
        self.claim_errors.load(Ordering::Relaxed)
    }

    /// Create a snapshot of the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.started_at,
            completed_at: *self.completed_at.lock(),
            sessions_claimed: self.sessions_claimed(),
            sessions_completed: self.sessions_completed(),
            sessions_failed: self.sessions_failed(),
            buckets_upserted: self.buckets_upserted(),
            objects_upserted: self.objects_upserted(),
            partitions_failed: self.partitions_failed(),
            claim_errors: self.claim_errors(),
        }
    }
}

/// A serializable snapshot of worker statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sessions_claimed: u64,
    pub sessions_completed: u64,
    pub sessions_failed: u64,
    pub buckets_upserted: u64,
    pub objects_upserted: u64,
    pub partitions_failed: u64,
    pub claim_errors: u64,
}

impl StatsSnapshot {
    /// Get the total duration of the worker run.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Total catalog records written.
    pub fn items_upserted(&self) -> u64 {
        self.buckets_upserted + self.objects_upserted
    }
}
