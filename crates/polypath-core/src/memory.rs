//! In-process flat key store
//!
//! Backs the built-in `memory://` scheme and most of the test-suite. Buckets
//! are created on first write.

use crate::backend::{ChunkStream, ClientHandle, Metadata};
use crate::store::{Listing, ObjectClient, ObjectInfo};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

#[derive(Debug, Clone)]
struct Entry {
    data: Bytes,
    metadata: Metadata,
    last_modified: DateTime<Utc>,
    version: u64,
}

type Buckets = HashMap<String, BTreeMap<String, Entry>>;

/// Handle to an in-memory object store
///
/// Cloning the handle shares the data; [`MemoryClient::new`] starts empty.
#[derive(Debug, Clone)]
pub struct MemoryClient {
    buckets: Arc<RwLock<Buckets>>,
    versions: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    /// Fresh, empty store
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            versions: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// New handle on the process-wide store used by the `memory://` scheme
    pub fn shared() -> Self {
        static SHARED: OnceLock<MemoryClient> = OnceLock::new();
        let shared = SHARED.get_or_init(MemoryClient::new);
        Self {
            buckets: shared.buckets.clone(),
            versions: shared.versions.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Every key in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn info(key: &str, entry: &Entry) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size: entry.data.len() as u64,
            last_modified: Some(entry.last_modified),
            etag: Some(format!("\"{}\"", entry.version)),
            metadata: entry.metadata.clone(),
        }
    }

    fn lookup(&self, bucket: &str, key: &str) -> Option<Entry> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.get(bucket).and_then(|objects| objects.get(key)).cloned()
    }

    fn not_found(bucket: &str, key: &str) -> Error {
        Error::NotFound(format!("memory object {bucket}/{key}"))
    }
}

impl ClientHandle for MemoryClient {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectInfo>> {
        Ok(self.lookup(bucket, key).map(|entry| Self::info(key, &entry)))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.lookup(bucket, key)
            .map(|entry| entry.data)
            .ok_or_else(|| Self::not_found(bucket, key))
    }

    async fn get_stream(&self, bucket: &str, key: &str, chunk_size: usize) -> Result<ChunkStream> {
        let data = self.get(bucket, key).await?;
        let chunk_size = chunk_size.max(1);
        let chunks: Vec<Result<Bytes>> = (0..data.len())
            .step_by(chunk_size)
            .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }

    async fn put(&self, bucket: &str, key: &str, data: Bytes, metadata: Metadata) -> Result<()> {
        let version = self.versions.fetch_add(1, Ordering::Relaxed) + 1;
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            Entry {
                data,
                metadata,
                last_modified: Utc::now(),
                version,
            },
        );
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(objects) = buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let entry = self
            .lookup(src_bucket, src_key)
            .ok_or_else(|| Self::not_found(src_bucket, src_key))?;
        self.put(dst_bucket, dst_key, entry.data, entry.metadata)
            .await
    }

    async fn list(&self, bucket: &str, prefix: &str, delimited: bool) -> Result<Listing> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        let Some(objects) = buckets.get(bucket) else {
            return Ok(Listing::default());
        };

        let mut listing = Listing::default();
        let mut prefixes = BTreeSet::new();
        for (key, entry) in objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let rest = &key[prefix.len()..];
            match rest.find('/') {
                Some(idx) if delimited => {
                    prefixes.insert(format!("{}{}", prefix, &rest[..=idx]));
                }
                _ => listing.objects.push(Self::info(key, entry)),
            }
        }
        listing.common_prefixes = prefixes.into_iter().collect();
        Ok(listing)
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(buckets.contains_key(bucket))
    }
}
