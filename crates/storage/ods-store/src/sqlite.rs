//! SQLite-backed session queue and catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ods_error::{OdsError, Result, StoreError};
use ods_traits::{CatalogRepository, SessionQueue};
use ods_types::{BucketRecord, Job, ObjectRecord, ScanSession, SessionId, SessionStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::error::DatabaseError;
use sqlx::{FromRow, Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS scan_sessions (
    id           TEXT PRIMARY KEY NOT NULL,
    job          TEXT NOT NULL,
    status       TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'completed')),
    created_at   TEXT NOT NULL,
    started_at   TEXT,
    completed_at TEXT,
    object_count INTEGER
);

CREATE INDEX IF NOT EXISTS idx_scan_sessions_status
    ON scan_sessions (status, created_at);

CREATE TABLE IF NOT EXISTS buckets (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    namespace  TEXT NOT NULL,
    data       TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    scan_id    TEXT,
    UNIQUE (name, namespace)
);

CREATE TABLE IF NOT EXISTS objects (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    bucket     TEXT NOT NULL,
    name       TEXT NOT NULL,
    data       TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    scan_id    TEXT,
    UNIQUE (bucket, name)
);
"#;

const SESSION_COLUMNS: &str = "id, job, status, created_at, started_at, completed_at, object_count";

/// Connection settings for [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Database URL, e.g. `sqlite://ods.db` or `sqlite::memory:`
    pub url: String,

    /// Maximum pooled connections (forced to 1 for in-memory databases)
    pub max_connections: u32,

    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://ods.db".to_string(),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteStoreConfig {
    /// Create a configuration for `url` with defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the maximum pooled connections.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// SQLite store shared by every worker process pointed at the same file.
///
/// Claiming is a single `UPDATE ... RETURNING` statement; SQLite serialises
/// writers, so two processes can never claim the same pending session.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: String,
    job: String,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    object_count: Option<i64>,
}

impl TryFrom<SessionRow> for ScanSession {
    type Error = OdsError;

    fn try_from(row: SessionRow) -> Result<Self> {
        let id = SessionId::from_str(&row.id)
            .map_err(|e| StoreError::Deserialize(format!("session id '{}': {e}", row.id)))?;
        let job: Job = serde_json::from_str(&row.job).map_err(|e| StoreError::UnreadableJob {
            session_id: id.to_string(),
            reason: e.to_string(),
        })?;
        let status = SessionStatus::from_str(&row.status).map_err(StoreError::Deserialize)?;

        Ok(ScanSession {
            id,
            job,
            status,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            object_count: row.object_count.map(|n| n.max(0) as u64),
        })
    }
}

#[derive(Debug, FromRow)]
struct BucketRow {
    name: String,
    namespace: String,
    data: String,
    updated_at: DateTime<Utc>,
    scan_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct ObjectRow {
    bucket: String,
    name: String,
    data: String,
    updated_at: DateTime<Utc>,
    scan_id: Option<String>,
}

impl TryFrom<BucketRow> for BucketRecord {
    type Error = OdsError;

    fn try_from(row: BucketRow) -> Result<Self> {
        Ok(BucketRecord {
            data: decode_blob(&row.data)?,
            scan_id: decode_scan_id(row.scan_id)?,
            name: row.name,
            namespace: row.namespace,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<ObjectRow> for ObjectRecord {
    type Error = OdsError;

    fn try_from(row: ObjectRow) -> Result<Self> {
        Ok(ObjectRecord {
            data: decode_blob(&row.data)?,
            scan_id: decode_scan_id(row.scan_id)?,
            bucket: row.bucket,
            name: row.name,
            updated_at: row.updated_at,
        })
    }
}

fn decode_blob(data: &str) -> Result<serde_json::Value> {
    serde_json::from_str(data).map_err(|e| StoreError::Deserialize(format!("data blob: {e}")).into())
}

fn decode_scan_id(scan_id: Option<String>) -> Result<Option<SessionId>> {
    scan_id
        .map(|s| {
            SessionId::from_str(&s)
                .map_err(|e| StoreError::Deserialize(format!("scan id '{s}': {e}")).into())
        })
        .transpose()
}

fn encode_blob(data: &serde_json::Value) -> Result<String> {
    serde_json::to_string(data).map_err(|e| StoreError::Serialize(e.to_string()).into())
}

/// `SQLITE_BUSY` or `SQLITE_LOCKED`, including their extended codes.
fn is_lock_contention(db: &dyn DatabaseError) -> bool {
    let primary = db
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| code & 0xff);
    matches!(primary, Some(5 | 6)) || db.message().contains("database is locked")
}

/// Map a sqlx error onto the store taxonomy.
fn store_err(context: &str, error: sqlx::Error) -> OdsError {
    let store_error = match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::DuplicateKey(format!("{context}: {}", db.message()))
        }
        // Another process held the write lock past busy_timeout.
        sqlx::Error::Database(db) if is_lock_contention(&**db) => {
            StoreError::Connection(format!("{context}: {}", db.message()))
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(format!("{context}: {error}"))
        }
        _ => StoreError::Query(format!("{context}: {error}")),
    };
    store_error.into()
}

impl SqliteStore {
    /// Connect to `url` with default settings and apply the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(SqliteStoreConfig::new(url)).await
    }

    /// Open a private in-memory database (one connection).
    pub async fn in_memory() -> Result<Self> {
        Self::connect_with(SqliteStoreConfig::new("sqlite::memory:")).await
    }

    /// Connect using an explicit configuration and apply the schema.
    pub async fn connect_with(config: SqliteStoreConfig) -> Result<Self> {
        let in_memory = config.is_in_memory();

        let mut opts = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| OdsError::Config(format!("invalid database url '{}': {e}", config.url)))?
            .create_if_missing(true)
            .busy_timeout(config.busy_timeout);

        if !in_memory {
            opts = opts.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to `:memory:` is a separate database.
        let max_connections = if in_memory { 1 } else { config.max_connections.max(1) };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {e}", config.url)))?;

        let store = Self { pool };
        store.migrate().await?;

        info!(url = %config.url, max_connections, "Connected to SQLite store");
        Ok(store)
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SessionQueue for SqliteStore {
    async fn create_session(&self, job: Job) -> Result<ScanSession> {
        let session = ScanSession::pending(job);
        let job_json =
            serde_json::to_string(&session.job).map_err(|e| StoreError::Serialize(e.to_string()))?;

        sqlx::query(
            "INSERT INTO scan_sessions (id, job, status, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session.id.to_string())
        .bind(job_json)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("create session", e))?;

        debug!(session_id = %session.id, job = %session.job.name, "Created session");
        Ok(session)
    }

    async fn claim_next(&self) -> Result<Option<ScanSession>> {
        let sql = format!(
            "UPDATE scan_sessions
             SET status = 'in_progress', started_at = ?
             WHERE id = (
                 SELECT id FROM scan_sessions
                 WHERE status = 'pending'
                 ORDER BY julianday(created_at), rowid
                 LIMIT 1
             )
             AND status = 'pending'
             RETURNING {SESSION_COLUMNS}"
        );

        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("claim session", e))?;

        row.map(ScanSession::try_from).transpose()
    }

    async fn complete(&self, id: &SessionId, object_count: Option<u64>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE scan_sessions
             SET status = 'completed',
                 completed_at = ?,
                 object_count = COALESCE(?, object_count)
             WHERE id = ? AND status IN ('in_progress', 'completed')",
        )
        .bind(Utc::now())
        .bind(object_count.map(|n| n as i64))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("complete session", e))?;

        if result.rows_affected() == 0 {
            return match self.get_session(id).await? {
                Some(_) => {
                    warn!(session_id = %id, "Refusing to complete a session that was never claimed");
                    Err(StoreError::InvalidTransition(format!("session {id} was never claimed")).into())
                }
                None => Err(StoreError::NotFound(format!("session {id}")).into()),
            };
        }

        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<ScanSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM scan_sessions WHERE id = ?");
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("get session", e))?;

        row.map(ScanSession::try_from).transpose()
    }

    async fn requeue_stale(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE scan_sessions
             SET status = 'pending', started_at = NULL
             WHERE status = 'in_progress'
               AND started_at IS NOT NULL
               AND julianday(started_at) < julianday(?)",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("requeue stale sessions", e))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CatalogRepository for SqliteStore {
    async fn upsert_bucket(&self, record: &BucketRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO buckets (name, namespace, data, updated_at, scan_id)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (name, namespace) DO UPDATE SET
                 data = excluded.data,
                 updated_at = excluded.updated_at,
                 scan_id = excluded.scan_id",
        )
        .bind(&record.name)
        .bind(&record.namespace)
        .bind(encode_blob(&record.data)?)
        .bind(record.updated_at)
        .bind(record.scan_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("upsert bucket", e))?;
        Ok(())
    }

    async fn upsert_object(&self, record: &ObjectRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO objects (bucket, name, data, updated_at, scan_id)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (bucket, name) DO UPDATE SET
                 data = excluded.data,
                 updated_at = excluded.updated_at,
                 scan_id = excluded.scan_id",
        )
        .bind(&record.bucket)
        .bind(&record.name)
        .bind(encode_blob(&record.data)?)
        .bind(record.updated_at)
        .bind(record.scan_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("upsert object", e))?;
        Ok(())
    }

    async fn find_active_buckets(&self) -> Result<Vec<BucketRecord>> {
        let rows = sqlx::query_as::<_, BucketRow>(
            "SELECT name, namespace, data, updated_at, scan_id FROM buckets ORDER BY namespace, name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("find buckets", e))?;

        rows.into_iter().map(BucketRecord::try_from).collect()
    }

    async fn find_object(&self, bucket: &str, name: &str) -> Result<Option<ObjectRecord>> {
        let row = sqlx::query_as::<_, ObjectRow>(
            "SELECT bucket, name, data, updated_at, scan_id FROM objects WHERE bucket = ? AND name = ?",
        )
        .bind(bucket)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("find object", e))?;

        row.map(ObjectRecord::try_from).transpose()
    }

    async fn find_objects(&self, bucket: &str) -> Result<Vec<ObjectRecord>> {
        let rows = sqlx::query_as::<_, ObjectRow>(
            "SELECT bucket, name, data, updated_at, scan_id FROM objects WHERE bucket = ? ORDER BY name",
        )
        .bind(bucket)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("find objects", e))?;

        rows.into_iter().map(ObjectRecord::try_from).collect()
    }
}
