//! The flat key-store primitive behind every object-store backend
//!
//! Object stores only know buckets and keys. [`ObjectClient`] is the small
//! surface the directory emulation engine needs from them: point lookups,
//! whole-object transfers, a chunked download, server-side copy and a prefix
//! listing that can optionally be split on `/`.
//!
//! Keys are raw strings. A key ending in `/` is a directory marker.

use crate::backend::{ChunkStream, ClientHandle, Metadata};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;

/// What a point lookup or a listing knows about one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    /// User metadata; listings may leave this empty
    pub metadata: Metadata,
}

impl ObjectInfo {
    /// Directory markers are empty objects whose key ends in `/`
    pub fn is_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// Result of a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Objects whose key starts with the prefix
    pub objects: Vec<ObjectInfo>,
    /// With a delimiter: `prefix/child/` groups, each ending in `/`
    pub common_prefixes: Vec<String>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.common_prefixes.is_empty()
    }
}

/// Flat bucket/key store
#[async_trait]
pub trait ObjectClient: ClientHandle + fmt::Debug {
    /// Metadata for `key`, `None` when absent
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectInfo>>;

    /// Whole object; `NotFound` when absent
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Chunked download; `NotFound` when absent
    async fn get_stream(&self, bucket: &str, key: &str, chunk_size: usize) -> Result<ChunkStream>;

    /// Whole-object upload, replacing any existing object
    async fn put(&self, bucket: &str, key: &str, data: Bytes, metadata: Metadata) -> Result<()>;

    /// Remove `key`; absent keys are not an error
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Server-side copy, metadata included
    async fn copy(&self, src_bucket: &str, src_key: &str, dst_bucket: &str, dst_key: &str)
        -> Result<()>;

    /// Every key starting with `prefix`; with `delimited`, keys below the next
    /// `/` are folded into common prefixes
    async fn list(&self, bucket: &str, prefix: &str, delimited: bool) -> Result<Listing>;

    async fn bucket_exists(&self, _bucket: &str) -> Result<bool> {
        Ok(true)
    }
}
