//! CLI argument definitions for ods-worker.

use clap::Parser;
pub use ods_cli_common::LogLevel;

/// Scan session worker for the object discovery service.
///
/// Polls the session store, claims one pending session at a time, lists the
/// buckets or objects the session's job targets and upserts every item into
/// the catalog. Run several processes against the same database to scale out.
///
/// ## Examples
///
/// Long-running worker against OCI Object Storage:
///   ods-worker --namespace axaxnpcrorw5 --region us-ashburn-1
///
/// Process everything pending, then exit:
///   ods-worker --drain --database-url sqlite:///var/lib/ods/ods.db
///
/// S3-compatible endpoint with explicit credentials:
///   ods-worker --s3-endpoint http://localhost:9000 --access-key minio --secret-key minio123
#[derive(Parser, Debug)]
#[command(name = "ods-worker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Session Store ===
    /// Database holding sessions and the catalog
    #[arg(long, env = "ODS_DATABASE_URL", default_value = "sqlite://ods.db")]
    pub database_url: String,

    /// Maximum pooled database connections (must be >= 1)
    #[arg(long, default_value = "4", value_parser = parse_positive_u32)]
    pub max_connections: u32,

    /// Seconds to sleep after an empty poll
    #[arg(long, env = "ODS_IDLE_INTERVAL", default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub idle_interval: u64,

    /// Drain mode: exit the first time no session is pending
    #[arg(long)]
    pub drain: bool,

    /// Worker identifier used in logs (defaults to worker-<pid>)
    #[arg(long, env = "ODS_WORKER_ID")]
    pub worker_id: Option<String>,

    // === Listing ===
    /// Partitions listed concurrently within one session (must be >= 1)
    #[arg(short = 'c', long, default_value = "4", value_parser = parse_positive_usize)]
    pub concurrency: usize,

    /// Items buffered between partition listers and the catalog writer (must be >= 1)
    #[arg(long, default_value = "256", value_parser = parse_positive_usize)]
    pub buffer: usize,

    /// Items requested per listing page (must be >= 1)
    #[arg(long, default_value = "1000", value_parser = parse_positive_u32)]
    pub page_size: u32,

    /// Abort an object listing on the first failed partition
    #[arg(long)]
    pub fail_fast: bool,

    // === Retry ===
    /// Retries per page fetch before giving up
    #[arg(long, default_value = "5")]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    #[arg(long, default_value = "500")]
    pub base_delay_ms: u64,

    /// Multiplier applied to the delay after each retry
    #[arg(long, default_value = "2.0")]
    pub backoff_factor: f64,

    /// Upper bound for a single retry delay, in milliseconds
    #[arg(long, default_value = "30000")]
    pub max_delay_ms: u64,

    // === Object Storage ===
    /// Custom S3-compatible endpoint URL (overrides the OCI compatibility endpoint)
    #[arg(long, env = "ODS_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// OCI region, e.g. us-ashburn-1
    #[arg(long, env = "OCI_REGION")]
    pub region: Option<String>,

    /// OCI Object Storage namespace
    #[arg(long, env = "OCI_NAMESPACE")]
    pub namespace: Option<String>,

    /// Customer secret key ID
    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    pub access_key: Option<String>,

    /// Customer secret key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY")]
    pub secret_key: Option<String>,

    /// Credentials profile name
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout: u64,

    // === Logging ===
    /// Log level
    #[arg(short = 'l', long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

/// Parse a positive usize (>= 1).
fn parse_positive_usize(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if value < 1 {
        return Err(format!("{} is not in 1..", value));
    }
    Ok(value)
}

/// Parse a positive u32 (>= 1).
fn parse_positive_u32(s: &str) -> Result<u32, String> {
    let value: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if value < 1 {
        return Err(format!("{} is not in 1..", value));
    }
    Ok(value)
}
