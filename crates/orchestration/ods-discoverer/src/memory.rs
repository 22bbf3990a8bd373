//! In-memory listing backend for local runs and testing.

use async_trait::async_trait;
use ods_error::{ListingError, OdsError, Result};
use ods_traits::ListingBackend;
use ods_types::{BucketEntry, ObjectEntry, Page, PageRequest};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Deterministic listing backend over fixed bucket and object sets.
///
/// Pages are cut by name: the continuation cursor of a page is the name of
/// the first entry on the next page, the way OCI's `nextStartWith` works.
#[derive(Debug)]
pub struct MemoryBackend {
    page_size: usize,

    /// Buckets by namespace, ordered by name
    buckets: BTreeMap<String, BTreeMap<String, BucketEntry>>,

    /// Objects by bucket, ordered by name
    objects: BTreeMap<String, BTreeMap<String, ObjectEntry>>,

    /// `(bucket, prefix)` pairs whose object listing is always denied
    denied_prefixes: BTreeSet<(String, String)>,

    /// One-shot errors returned by the next calls, in order
    injected: Mutex<VecDeque<OdsError>>,

    page_calls: AtomicU64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            page_size: 1000,
            buckets: BTreeMap::new(),
            objects: BTreeMap::new(),
            denied_prefixes: BTreeSet::new(),
            injected: Mutex::new(VecDeque::new()),
            page_calls: AtomicU64::new(0),
        }
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add a bucket to `namespace`.
    pub fn with_bucket(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        let entry = BucketEntry {
            name: name.clone(),
            namespace: namespace.clone(),
            region: None,
            time_created: None,
            etag: None,
        };
        self.objects.entry(name.clone()).or_default();
        self.buckets.entry(namespace).or_default().insert(name, entry);
        self
    }

    /// Add objects to `bucket`, creating it if needed.
    pub fn with_objects(
        mut self,
        bucket: impl Into<String>,
        objects: impl IntoIterator<Item = ObjectEntry>,
    ) -> Self {
        let entries = self.objects.entry(bucket.into()).or_default();
        for object in objects {
            entries.insert(object.name.clone(), object);
        }
        self
    }

    /// Make every object listing of `bucket` under `prefix` fail with access denied.
    pub fn with_denied_prefix(mut self, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.denied_prefixes.insert((bucket.into(), prefix.into()));
        self
    }

    /// Queue an error to be returned by the next page call.
    pub fn inject_error(&self, error: impl Into<OdsError>) {
        self.injected.lock().push_back(error.into());
    }

    /// Total page calls served, including failed ones.
    pub fn page_calls(&self) -> u64 {
        self.page_calls.load(Ordering::Relaxed)
    }

    fn begin_call(&self) -> Result<()> {
        self.page_calls.fetch_add(1, Ordering::Relaxed);
        match self.injected.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn limit(&self, request: &PageRequest) -> usize {
        request
            .page_size
            .map(|n| n as usize)
            .unwrap_or(self.page_size)
            .clamp(1, self.page_size)
    }
}

/// Cut one page out of name-ordered entries starting at `cursor`.
fn cut_page<'a, T: Clone + 'a>(
    entries: impl Iterator<Item = (&'a String, &'a T)>,
    cursor: Option<&str>,
    limit: usize,
) -> Page<T> {
    let mut remaining = entries.skip_while(|(name, _)| cursor.is_some_and(|c| name.as_str() < c));

    let items: Vec<T> = remaining
        .by_ref()
        .take(limit)
        .map(|(_, entry)| entry.clone())
        .collect();
    let next_cursor = remaining.next().map(|(name, _)| name.clone());

    Page::new(items, next_cursor)
}

#[async_trait]
impl ListingBackend for MemoryBackend {
    async fn list_bucket_page(&self, request: &PageRequest) -> Result<Page<BucketEntry>> {
        self.begin_call()?;

        let page = match self.buckets.get(&request.namespace) {
            Some(buckets) => cut_page(buckets.iter(), request.cursor.as_deref(), self.limit(request)),
            None => Page::last(Vec::new()),
        };
        Ok(page)
    }

    async fn list_object_page(&self, request: &PageRequest) -> Result<Page<ObjectEntry>> {
        self.begin_call()?;

        let bucket = request.container.as_deref().ok_or_else(|| ListingError::Client {
            status: 400,
            message: "object listing requires a bucket".to_string(),
        })?;
        let prefix = request.prefix.as_deref().unwrap_or_default();

        if self
            .denied_prefixes
            .contains(&(bucket.to_string(), prefix.to_string()))
        {
            return Err(ListingError::AccessDenied(format!("{bucket}/{prefix}")).into());
        }

        let objects = self
            .objects
            .get(bucket)
            .ok_or_else(|| ListingError::NotFound(format!("bucket {bucket}")))?;

        let matching = objects.iter().filter(|(name, _)| name.starts_with(prefix));
        Ok(cut_page(matching, request.cursor.as_deref(), self.limit(request)))
    }
}
