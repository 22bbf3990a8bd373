//! Scan session lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::job::Job;

/// Store-assigned identifier of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a scan session.
///
/// Transitions are monotonic: `Pending -> InProgress -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created by the scheduler, waiting for a worker
    Pending,

    /// Claimed by exactly one worker
    InProgress,

    /// Finished; terminal
    Completed,
}

impl SessionStatus {
    /// Wire / column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }

    /// Whether this is the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// A unit of scan work derived from a [`Job`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    /// Store-assigned identifier
    pub id: SessionId,

    /// The job this session executes
    pub job: Job,

    /// Current lifecycle state
    pub status: SessionStatus,

    /// When the scheduler created the session
    pub created_at: DateTime<Utc>,

    /// Set when a worker claims the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Set when the session completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of catalog items written by the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_count: Option<u64>,
}

impl ScanSession {
    /// A new pending session for `job`.
    pub fn pending(job: Job) -> Self {
        Self {
            id: SessionId::new(),
            job,
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            object_count: None,
        }
    }
}
