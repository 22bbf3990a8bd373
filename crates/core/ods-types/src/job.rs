//! Scan job definitions.

use serde::{Deserialize, Serialize};

/// A scan target loaded from the job manifest by the scheduler.
///
/// Immutable once created; a session embeds a copy of the job it was
/// created for. `frequency_minutes` is consumed by the scheduler only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Human-readable job name
    pub name: String,

    /// Provider tenancy / account identifier
    pub oci_tenancy_name: String,

    /// Object storage namespace
    pub oci_namespace: String,

    /// Provider region
    pub oci_region: String,

    /// Scheduling frequency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_minutes: Option<u32>,

    /// Which task to run and its typed payload
    #[serde(flatten)]
    pub kind: JobKind,
}

/// The task a job runs, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JobKind {
    /// Enumerate every bucket in the job's namespace
    ListBuckets,

    /// Enumerate objects in one bucket, or in every known bucket of the namespace
    ListObjects {
        /// Target bucket; `None` means all catalogued buckets of the namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bucket: Option<String>,

        /// Name prefixes scanned as independent partitions
        #[serde(default)]
        prefixes: Vec<String>,
    },
}

impl JobKind {
    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::ListBuckets => "list-buckets",
            JobKind::ListObjects { .. } => "list-objects",
        }
    }
}

impl Job {
    /// Create a bucket-listing job.
    pub fn list_buckets(
        name: impl Into<String>,
        tenancy: impl Into<String>,
        namespace: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            oci_tenancy_name: tenancy.into(),
            oci_namespace: namespace.into(),
            oci_region: region.into(),
            frequency_minutes: None,
            kind: JobKind::ListBuckets,
        }
    }

    /// Create an object-listing job.
    pub fn list_objects(
        name: impl Into<String>,
        tenancy: impl Into<String>,
        namespace: impl Into<String>,
        region: impl Into<String>,
        bucket: Option<String>,
        prefixes: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            oci_tenancy_name: tenancy.into(),
            oci_namespace: namespace.into(),
            oci_region: region.into(),
            frequency_minutes: None,
            kind: JobKind::ListObjects { bucket, prefixes },
        }
    }

    /// Set the scheduling frequency.
    pub fn with_frequency_minutes(mut self, minutes: u32) -> Self {
        self.frequency_minutes = Some(minutes);
        self
    }
}
