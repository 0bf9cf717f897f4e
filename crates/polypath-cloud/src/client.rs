//! [`ObjectClient`] over the `object_store` crate
//!
//! `object_store` paths cannot end in `/`, so directory markers are stored
//! under a reserved leaf: the marker key `photos/` lives at `photos/.dir`.
//! The translation is applied on every call and undone in listings.

use crate::error::{translate, CloudError};
use crate::provider::Provider;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use lru::LruCache;
use object_store::path::Path as StorePath;
use object_store::{
    Attribute, AttributeValue, Attributes, GetOptions, GetResult, ObjectMeta, ObjectStore,
    PutOptions, PutPayload,
};
use polypath_core::backend::{ChunkStream, ClientHandle, Metadata};
use polypath_core::store::{Listing, ObjectClient, ObjectInfo};
use polypath_core::{Error, Result};
use std::borrow::Cow;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Leaf name that stands in for a trailing `/`
pub const MARKER_LEAF: &str = ".dir";

/// Builds the store serving one bucket
pub type StoreFactory =
    Arc<dyn Fn(&str) -> std::result::Result<Arc<dyn ObjectStore>, CloudError> + Send + Sync>;

/// Flat key store backed by one `object_store` instance per bucket
pub struct ObjectStoreClient {
    label: String,
    factory: StoreFactory,
    stores: Mutex<LruCache<String, Arc<dyn ObjectStore>>>,
    closed: AtomicBool,
}

impl fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self
            .stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("ObjectStoreClient")
            .field("label", &self.label)
            .field("cached_stores", &cached)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl ObjectStoreClient {
    /// Client with a custom per-bucket factory
    pub fn with_factory(label: impl Into<String>, cache_size: usize, factory: StoreFactory) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            label: label.into(),
            factory,
            stores: Mutex::new(LruCache::new(capacity)),
            closed: AtomicBool::new(false),
        }
    }

    /// Client building environment-configured stores for `provider`
    pub fn for_provider(provider: Provider, cache_size: usize) -> Self {
        Self::with_factory(
            provider.label(),
            cache_size,
            Arc::new(move |bucket: &str| provider.build(bucket)),
        )
    }

    /// Client serving every bucket from one existing store
    pub fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        let label = store.to_string();
        Self::with_factory(label, 1, Arc::new(move |_: &str| Ok::<_, CloudError>(store.clone())))
    }

    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }
        debug!("{}: opening store for bucket {}", self.label, bucket);
        let store = (self.factory)(bucket)?;
        stores.put(bucket.to_string(), store.clone());
        Ok(store)
    }
}

impl ClientHandle for ObjectStoreClient {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Store location for a raw key
pub fn object_path(key: &str) -> std::result::Result<StorePath, CloudError> {
    let mapped: Cow<'_, str> = if key.ends_with('/') {
        Cow::Owned(format!("{key}{MARKER_LEAF}"))
    } else {
        Cow::Borrowed(key)
    };
    StorePath::parse(mapped.as_ref()).map_err(|e| CloudError::InvalidKey {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Raw key for a store location
pub fn key_of(location: &str) -> String {
    if location == MARKER_LEAF {
        return String::new();
    }
    match location.strip_suffix(MARKER_LEAF) {
        Some(dir) if dir.ends_with('/') => dir.to_string(),
        _ => location.to_string(),
    }
}

fn location(key: &str) -> Result<StorePath> {
    Ok(object_path(key)?)
}

/// Listing root for a key prefix and the filter applied to what comes back
///
/// `object_store` lists whole path segments, so a prefix ending mid-segment
/// lists its parent directory instead.
fn listing_root(prefix: &str) -> Result<(Option<StorePath>, Option<&str>)> {
    if prefix.is_empty() {
        return Ok((None, None));
    }
    if let Some(dir) = prefix.strip_suffix('/') {
        return Ok((Some(dir_path(dir)?), None));
    }
    match prefix.rfind('/') {
        Some(idx) => Ok((Some(dir_path(&prefix[..idx])?), Some(prefix))),
        None => Ok((None, Some(prefix))),
    }
}

fn dir_path(dir: &str) -> Result<StorePath> {
    StorePath::parse(dir).map_err(|e| {
        Error::from(CloudError::InvalidKey {
            key: format!("{dir}/"),
            reason: e.to_string(),
        })
    })
}

fn user_metadata(attributes: &Attributes) -> Metadata {
    attributes
        .iter()
        .filter_map(|(attribute, value)| match attribute {
            Attribute::Metadata(name) => {
                let value: &str = value.as_ref();
                Some((name.to_string(), value.to_string()))
            }
            _ => None,
        })
        .collect()
}

fn store_attributes(metadata: Metadata) -> Attributes {
    let mut attributes = Attributes::new();
    for (name, value) in metadata {
        attributes.insert(
            Attribute::Metadata(Cow::Owned(name)),
            AttributeValue::from(value),
        );
    }
    attributes
}

fn info(meta: &ObjectMeta, metadata: Metadata) -> ObjectInfo {
    ObjectInfo {
        key: key_of(meta.location.as_ref()),
        size: meta.size as u64,
        last_modified: Some(meta.last_modified),
        etag: meta.e_tag.clone(),
        metadata,
    }
}

fn split_chunks(data: Bytes, chunk_size: usize) -> Vec<Result<Bytes>> {
    (0..data.len())
        .step_by(chunk_size)
        .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
        .collect()
}

fn found(result: object_store::Result<GetResult>) -> Result<Option<GetResult>> {
    match result {
        Ok(found) => Ok(Some(found)),
        Err(object_store::Error::NotFound { .. }) => Ok(None),
        Err(err) => Err(translate(err)),
    }
}

#[async_trait]
impl ObjectClient for ObjectStoreClient {
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectInfo>> {
        let store = self.store(bucket)?;
        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let found = found(store.get_opts(&location(key)?, options).await)?;
        Ok(found.map(|result| info(&result.meta, user_metadata(&result.attributes))))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let store = self.store(bucket)?;
        let result = store.get(&location(key)?).await.map_err(translate)?;
        result.bytes().await.map_err(translate)
    }

    async fn get_stream(&self, bucket: &str, key: &str, chunk_size: usize) -> Result<ChunkStream> {
        let store = self.store(bucket)?;
        let result = store.get(&location(key)?).await.map_err(translate)?;
        let chunk_size = chunk_size.max(1);
        Ok(result
            .into_stream()
            .map_err(translate)
            .map_ok(move |data| stream::iter(split_chunks(data, chunk_size)))
            .try_flatten()
            .boxed())
    }

    async fn put(&self, bucket: &str, key: &str, data: Bytes, metadata: Metadata) -> Result<()> {
        let store = self.store(bucket)?;
        trace!("{}: put {}/{} ({} bytes)", self.label, bucket, key, data.len());
        let options = PutOptions {
            attributes: store_attributes(metadata),
            ..Default::default()
        };
        store
            .put_opts(&location(key)?, PutPayload::from(data), options)
            .await
            .map_err(translate)?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let store = self.store(bucket)?;
        match store.delete(&location(key)?).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(translate(err)),
        }
    }

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let from = location(src_key)?;
        let to = location(dst_key)?;
        let source = self.store(src_bucket)?;
        if src_bucket == dst_bucket {
            return source.copy(&from, &to).await.map_err(translate);
        }

        // Different buckets are different stores: download and re-upload
        let result = source
            .get_opts(&from, GetOptions::default())
            .await
            .map_err(translate)?;
        let attributes = result.attributes.clone();
        let data = result.bytes().await.map_err(translate)?;
        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        self.store(dst_bucket)?
            .put_opts(&to, PutPayload::from(data), options)
            .await
            .map_err(translate)?;
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str, delimited: bool) -> Result<Listing> {
        let store = self.store(bucket)?;
        let (root, filter) = listing_root(prefix)?;
        let keep = |key: &str| filter.map_or(true, |filter| key.starts_with(filter));

        let mut listing = Listing::default();
        if delimited {
            let result = match store.list_with_delimiter(root.as_ref()).await {
                Ok(result) => result,
                Err(object_store::Error::NotFound { .. }) => return Ok(listing),
                Err(err) => return Err(translate(err)),
            };
            listing.common_prefixes = result
                .common_prefixes
                .iter()
                .map(|p| format!("{}/", p.as_ref()))
                .filter(|p| keep(p))
                .collect();
            listing.objects = result
                .objects
                .iter()
                .map(|meta| info(meta, Metadata::new()))
                .filter(|object| keep(&object.key))
                .collect();
        } else {
            let objects: Vec<ObjectMeta> = store
                .list(root.as_ref())
                .try_collect()
                .await
                .map_err(translate)?;
            listing.objects = objects
                .iter()
                .map(|meta| info(meta, Metadata::new()))
                .filter(|object| keep(&object.key))
                .collect();
        }
        listing.objects.sort_by(|a, b| a.key.cmp(&b.key));
        listing.common_prefixes.sort();
        Ok(listing)
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let store = self.store(bucket)?;
        match store.list_with_delimiter(None).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(translate(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn client() -> ObjectStoreClient {
        ObjectStoreClient::with_store(Arc::new(InMemory::new()))
    }

    #[test]
    fn test_marker_keys_translate_both_ways() {
        assert_eq!(object_path("photos/").unwrap().as_ref(), "photos/.dir");
        assert_eq!(object_path("photos/a.jpg").unwrap().as_ref(), "photos/a.jpg");
        assert_eq!(key_of("photos/.dir"), "photos/");
        assert_eq!(key_of("photos/a.dir"), "photos/a.dir");
        assert_eq!(key_of("photos/a.jpg"), "photos/a.jpg");
    }

    #[test]
    fn test_invalid_keys_are_rejected() {
        let err = object_path("a//b").unwrap_err();
        assert!(matches!(err, CloudError::InvalidKey { .. }));
        let err: Error = object_path("a/../b").unwrap_err().into();
        assert!(matches!(err, Error::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_listing_folds_markers_and_prefixes() {
        let client = client();
        for key in ["X/a.txt", "X/b.log", "X/d/c.txt", "X/e/", "Xyz"] {
            client
                .put("bucket", key, Bytes::from_static(b"1"), Metadata::new())
                .await
                .unwrap();
        }

        let listing = client.list("bucket", "X/", true).await.unwrap();
        let keys: Vec<_> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["X/a.txt", "X/b.log"]);
        assert_eq!(listing.common_prefixes, vec!["X/d/", "X/e/"]);

        let listing = client.list("bucket", "X/e/", false).await.unwrap();
        let keys: Vec<_> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["X/e/"]);

        let listing = client.list("bucket", "X", false).await.unwrap();
        assert_eq!(listing.objects.len(), 5);
        assert_eq!(listing.objects[4].key, "Xyz");
    }

    #[tokio::test]
    async fn test_head_and_metadata() {
        let client = client();
        assert!(client.head("bucket", "missing").await.unwrap().is_none());

        let metadata = Metadata::from([("owner".to_string(), "ops".to_string())]);
        client
            .put("bucket", "k", Bytes::from_static(b"hello"), metadata.clone())
            .await
            .unwrap();
        let info = client.head("bucket", "k").await.unwrap().unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(info.metadata, metadata);

        client.copy("bucket", "k", "bucket", "k2").await.unwrap();
        let copied = client.head("bucket", "k2").await.unwrap().unwrap();
        assert_eq!(copied.metadata, metadata);
    }

    #[tokio::test]
    async fn test_stream_respects_chunk_size() {
        let client = client();
        client
            .put("bucket", "digits", Bytes::from_static(b"0123456789"), Metadata::new())
            .await
            .unwrap();
        let chunks: Vec<Bytes> = client
            .get_stream("bucket", "digits", 4)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let sizes: Vec<_> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        let err = client.get("bucket", "absent").await.unwrap_err();
        assert!(err.is_not_found());
        client.delete("bucket", "absent").await.unwrap();
    }

    #[test]
    fn test_close_drops_cached_stores() {
        let client = client();
        client.store("a").unwrap();
        assert!(!client.is_closed());
        client.close();
        assert!(client.is_closed());
        assert_eq!(client.stores.lock().unwrap().len(), 0);
    }
}
