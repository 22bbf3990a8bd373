//! Shared fixtures for integration tests.

pub mod localstack;

pub use localstack::LocalStackTestContext;

use ods_discoverer::MemoryBackend;
use ods_store::SqliteStore;
use ods_types::{Job, ObjectEntry};
use std::path::PathBuf;

pub const NAMESPACE: &str = "axaxnpcrorw5";
pub const REGION: &str = "us-ashburn-1";

/// A bucket-listing job for the test namespace.
pub fn buckets_job() -> Job {
    Job::list_buckets("nightly-buckets", "acme", NAMESPACE, REGION)
}

/// An object-listing job for the test namespace.
pub fn objects_job(bucket: Option<&str>, prefixes: &[&str]) -> Job {
    Job::list_objects(
        "nightly-objects",
        "acme",
        NAMESPACE,
        REGION,
        bucket.map(str::to_string),
        prefixes.iter().map(|p| p.to_string()).collect(),
    )
}

/// Two buckets: `logs` with 4 objects under `dev/` and 3 under `prod/` (plus
/// two directory markers), and `images` with 2 objects.
pub fn seeded_backend() -> MemoryBackend {
    MemoryBackend::new()
        .with_page_size(2)
        .with_bucket(NAMESPACE, "logs")
        .with_bucket(NAMESPACE, "images")
        .with_objects(
            "logs",
            [ObjectEntry::new("dev/", 0), ObjectEntry::new("prod/", 0)]
                .into_iter()
                .chain((0..4).map(|i| ObjectEntry::new(format!("dev/app-{i}.log"), 100 + i)))
                .chain((0..3).map(|i| ObjectEntry::new(format!("prod/app-{i}.log"), 200 + i))),
        )
        .with_objects(
            "images",
            [ObjectEntry::new("cat.png", 10), ObjectEntry::new("dog.png", 20)],
        )
}

/// A SQLite database file that is removed when dropped.
pub struct SqliteFile {
    pub path: PathBuf,
}

impl SqliteFile {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("ods-it-{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    pub async fn connect(&self) -> SqliteStore {
        SqliteStore::connect(&self.url()).await.unwrap()
    }
}

impl Drop for SqliteFile {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}
