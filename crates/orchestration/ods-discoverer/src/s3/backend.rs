//! Listing backend over the S3 compatibility API.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ods_error::{ListingError, OdsError, Result};
use ods_traits::ListingBackend;
use ods_types::{BucketEntry, ObjectEntry, Page, PageRequest};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::client::{S3Config, create_s3_client};

/// [`ListingBackend`] backed by `ListBuckets` and `ListObjectsV2`.
///
/// Each OCI namespace has its own compatibility endpoint, so requests for a
/// namespace or region other than the configured one are sent through a
/// client built for that endpoint. With an explicit endpoint and a configured
/// namespace, requests for other namespaces are rejected.
#[derive(Debug)]
pub struct S3Backend {
    config: S3Config,
    client: Client,
    clients: Mutex<HashMap<(String, String), Client>>,
}

/// Which client serves a request.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Default,
    Target { namespace: String, region: String },
}

impl S3Backend {
    /// Wrap an existing client. Every request goes through it.
    pub fn new(client: Client) -> Self {
        Self::with_config(S3Config::default(), client)
    }

    /// Build a client from `config` and wrap it.
    pub async fn from_config(config: &S3Config) -> Result<Self> {
        Ok(Self::with_config(config.clone(), create_s3_client(config).await?))
    }

    fn with_config(config: S3Config, client: Client) -> Self {
        Self {
            config,
            client,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The client for the configured namespace.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn route(&self, request: &PageRequest) -> Result<Route> {
        let Some(configured) = self.config.namespace.as_deref() else {
            return Ok(Route::Default);
        };

        if let Some(endpoint) = &self.config.endpoint {
            if request.namespace != configured {
                return Err(ListingError::Client {
                    status: 400,
                    message: format!(
                        "namespace {} is not served by {endpoint}",
                        request.namespace
                    ),
                }
                .into());
            }
            return Ok(Route::Default);
        }

        let region = request
            .region
            .as_deref()
            .or(self.config.region.as_deref())
            .ok_or_else(|| {
                OdsError::Config(format!("no region for namespace {}", request.namespace))
            })?;

        if request.namespace == configured && self.config.region.as_deref() == Some(region) {
            return Ok(Route::Default);
        }

        Ok(Route::Target {
            namespace: request.namespace.clone(),
            region: region.to_string(),
        })
    }

    async fn client_for(&self, request: &PageRequest) -> Result<Client> {
        let (namespace, region) = match self.route(request)? {
            Route::Default => return Ok(self.client.clone()),
            Route::Target { namespace, region } => (namespace, region),
        };

        let key = (namespace, region);
        let cached = self.clients.lock().get(&key).cloned();
        if let Some(client) = cached {
            return Ok(client);
        }

        let config = self
            .config
            .clone()
            .with_namespace(&key.0)
            .with_region(&key.1);
        let client = create_s3_client(&config).await?;
        debug!(namespace = %key.0, region = %key.1, "Created client for namespace");

        Ok(self.clients.lock().entry(key).or_insert(client).clone())
    }
}

fn to_chrono(t: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.secs(), t.subsec_nanos())
}

fn page_size(request: &PageRequest) -> Option<i32> {
    request
        .page_size
        .map(|n| i32::try_from(n).unwrap_or(i32::MAX))
}

/// Map an SDK failure onto the listing taxonomy so retries can classify it.
fn map_sdk_error<E>(operation: &str, error: SdkError<E, HttpResponse>) -> OdsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match &error {
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            let service_error = ctx.err();
            let message = format!(
                "{operation}: {}",
                service_error.message().unwrap_or("no message")
            );
            ListingError::from_status(status, service_error.code(), message).into()
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ListingError::Unavailable(format!("{operation}: {}", DisplayErrorContext(&error)))
                .into()
        }
        _ => OdsError::Config(format!("{operation}: {}", DisplayErrorContext(&error))),
    }
}

#[async_trait]
impl ListingBackend for S3Backend {
    async fn list_bucket_page(&self, request: &PageRequest) -> Result<Page<BucketEntry>> {
        let response = self
            .client_for(request)
            .await?
            .list_buckets()
            .set_continuation_token(request.cursor.clone())
            .set_max_buckets(page_size(request))
            .send()
            .await
            .map_err(|e| map_sdk_error("ListBuckets", e))?;

        let items: Vec<BucketEntry> = response
            .buckets()
            .iter()
            .filter_map(|bucket| {
                Some(BucketEntry {
                    name: bucket.name()?.to_string(),
                    namespace: request.namespace.clone(),
                    region: bucket.bucket_region().map(str::to_string),
                    time_created: bucket.creation_date().and_then(to_chrono),
                    etag: None,
                })
            })
            .collect();

        trace!(namespace = %request.namespace, items = items.len(), "ListBuckets page");
        Ok(Page::new(
            items,
            response.continuation_token().map(str::to_string),
        ))
    }

    async fn list_object_page(&self, request: &PageRequest) -> Result<Page<ObjectEntry>> {
        let bucket = request.container.as_deref().ok_or_else(|| ListingError::Client {
            status: 400,
            message: "object listing requires a bucket".to_string(),
        })?;

        let response = self
            .client_for(request)
            .await?
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(request.prefix.clone())
            .set_continuation_token(request.cursor.clone())
            .set_max_keys(page_size(request))
            .send()
            .await
            .map_err(|e| map_sdk_error("ListObjectsV2", e))?;

        let items: Vec<ObjectEntry> = response
            .contents()
            .iter()
            .map(|object| ObjectEntry {
                name: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or(0).max(0) as u64,
                etag: object.e_tag().map(|t| t.trim_matches('"').to_string()),
                content_type: None,
                time_created: None,
                time_modified: object.last_modified().and_then(to_chrono),
            })
            .collect();

        let next_cursor = if response.is_truncated() == Some(true) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        trace!(bucket, items = items.len(), truncated = next_cursor.is_some(), "ListObjectsV2 page");
        Ok(Page::new(items, next_cursor))
    }
}
