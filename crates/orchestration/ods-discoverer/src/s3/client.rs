//! S3 client configuration and creation.

use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use ods_error::{OdsError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// The S3 compatibility endpoint of OCI Object Storage.
pub fn oci_compat_endpoint(namespace: &str, region: &str) -> String {
    format!("https://{namespace}.compat.objectstorage.{region}.oraclecloud.com")
}

/// Configuration for S3-compatible access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Region, e.g. `us-ashburn-1`
    pub region: Option<String>,

    /// Object storage namespace, used to derive the OCI compatibility endpoint
    pub namespace: Option<String>,

    /// Explicit endpoint URL; overrides the derived OCI endpoint
    pub endpoint: Option<String>,

    /// Customer secret key id (optional)
    pub access_key: Option<String>,

    /// Customer secret key (optional)
    pub secret_key: Option<String>,

    /// Shared credentials profile name (optional)
    pub profile: Option<String>,

    /// Per-operation timeout in seconds
    pub timeout_secs: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: None,
            namespace: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
            profile: None,
            timeout_secs: 30,
        }
    }
}

impl S3Config {
    /// Create a configuration for the OCI compatibility endpoint of `namespace` in `region`.
    pub fn for_oci(namespace: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            region: Some(region.into()),
            ..Default::default()
        }
    }

    /// Set a custom endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set explicit credentials.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set the credentials profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set the per-operation timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// The endpoint the client will talk to, if any.
    pub fn resolved_endpoint(&self) -> Option<String> {
        if let Some(endpoint) = &self.endpoint {
            return Some(endpoint.clone());
        }
        match (&self.namespace, &self.region) {
            (Some(namespace), Some(region)) => Some(oci_compat_endpoint(namespace, region)),
            _ => None,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err("access_key and secret_key must be set together".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be positive".to_string());
        }
        Ok(())
    }
}

/// Create an S3 client from configuration.
pub async fn create_s3_client(config: &S3Config) -> Result<Client> {
    use aws_config::Region;

    config.validate().map_err(OdsError::Config)?;

    let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(
        TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_secs))
            .build(),
    );

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }

    let endpoint = config.resolved_endpoint();
    if let Some(endpoint) = &endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "ods-discoverer",
        );
        loader = loader.credentials_provider(credentials);
    }

    if let Some(profile) = &config.profile {
        loader = loader.profile_name(profile);
    }

    let sdk_config = loader.load().await;
    let builder = aws_sdk_s3::config::Builder::from(&sdk_config);

    // Compatibility endpoints only accept path-style addressing.
    let s3_config = if endpoint.is_some() {
        builder.force_path_style(true).build()
    } else {
        builder.build()
    };

    debug!(endpoint = ?endpoint, region = ?config.region, "Created S3 client");
    Ok(Client::from_conf(s3_config))
}
