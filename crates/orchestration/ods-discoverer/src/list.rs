//! Cursor-driven listing with per-page retries.

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt, future};
use ods_error::{ListingError, Result};
use ods_traits::ListingBackend;
use ods_types::{BucketEntry, ObjectEntry, Page, PageRequest};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::retry::{RetryConfig, with_retry};

/// Options shared by every listing call of a scan.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Requested page size; `None` lets the backend decide
    pub page_size: Option<u32>,

    /// Retry policy applied to each page fetch
    pub retry: RetryConfig,

    /// Region of the namespace being listed
    pub region: Option<String>,
}

impl ListOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requested page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set the per-page retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the region of the namespace being listed.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Drive a paginated upstream call to completion as a lazy stream of items.
///
/// `fetch` receives the continuation cursor (`None` for the first page) and
/// returns one page. Each fetch is wrapped in [`with_retry`] on its own, so a
/// transient failure on page N does not discard items already yielded from
/// pages before it. The stream ends when a page carries no cursor (or an
/// empty one). Empty pages that still carry a cursor are followed. A cursor
/// that was already followed ends the stream with
/// [`ListingError::InvalidResponse`].
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
///
/// let items = paginate(RetryConfig::default(), "list_things", |cursor| {
///     let client = client.clone();
///     async move { client.fetch_page(cursor).await }
/// });
/// futures::pin_mut!(items);
///
/// while let Some(item) = items.next().await {
///     println!("{:?}", item?);
/// }
/// ```
pub fn paginate<T, F, Fut>(
    retry: RetryConfig,
    operation: impl Into<String>,
    mut fetch: F,
) -> impl Stream<Item = Result<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let operation = operation.into();

    try_stream! {
        let mut cursor: Option<String> = None;
        let mut seen: HashSet<String> = HashSet::new();
        let mut pages = 0u64;

        loop {
            let page = with_retry(&retry, &operation, || fetch(cursor.clone())).await?;
            pages += 1;

            debug!(
                operation = %operation,
                page = pages,
                items = page.items.len(),
                "Fetched page"
            );

            let next = advance_cursor(&operation, &mut seen, page.next_cursor)?;

            for item in page.items {
                yield item;
            }

            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
    }
}

/// Decide the cursor for the next page, or `None` when the listing is done.
fn advance_cursor(
    operation: &str,
    seen: &mut HashSet<String>,
    next: Option<String>,
) -> Result<Option<String>> {
    let Some(next) = next.filter(|c| !c.is_empty()) else {
        return Ok(None);
    };

    if !seen.insert(next.clone()) {
        return Err(ListingError::InvalidResponse(format!(
            "{operation}: continuation cursor '{next}' was already followed"
        ))
        .into());
    }

    Ok(Some(next))
}

/// List every bucket in `namespace`.
pub fn list_buckets<B>(
    backend: Arc<B>,
    namespace: impl Into<String>,
    options: &ListOptions,
) -> BoxStream<'static, Result<BucketEntry>>
where
    B: ListingBackend + ?Sized + 'static,
{
    let namespace = namespace.into();
    let page_size = options.page_size;
    let region = options.region.clone();
    let operation = format!("list_buckets({namespace})");

    paginate(options.retry.clone(), operation, move |cursor| {
        let backend = backend.clone();
        let request = PageRequest {
            namespace: namespace.clone(),
            region: region.clone(),
            container: None,
            prefix: None,
            cursor,
            page_size,
        };
        async move { backend.list_bucket_page(&request).await }
    })
    .boxed()
}

/// List every object in `bucket` under `prefix`.
///
/// Directory markers (keys ending with `/`) and empty keys are skipped.
pub fn list_objects<B>(
    backend: Arc<B>,
    namespace: impl Into<String>,
    bucket: impl Into<String>,
    prefix: Option<String>,
    options: &ListOptions,
) -> BoxStream<'static, Result<ObjectEntry>>
where
    B: ListingBackend + ?Sized + 'static,
{
    let namespace = namespace.into();
    let bucket = bucket.into();
    let prefix = prefix.filter(|p| !p.is_empty());
    let page_size = options.page_size;
    let region = options.region.clone();
    let operation = format!(
        "list_objects({bucket}/{})",
        prefix.as_deref().unwrap_or_default()
    );

    paginate(options.retry.clone(), operation, move |cursor| {
        let backend = backend.clone();
        let request = PageRequest {
            namespace: namespace.clone(),
            region: region.clone(),
            container: Some(bucket.clone()),
            prefix: prefix.clone(),
            cursor,
            page_size,
        };
        async move { backend.list_object_page(&request).await }
    })
    .try_filter(|entry| future::ready(!entry.is_directory_marker()))
    .boxed()
}
