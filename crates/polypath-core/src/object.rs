//! Filesystem semantics for flat object stores
//!
//! [`ObjectBackend`] implements the full [`Backend`] contract on top of any
//! [`ObjectClient`]. Directories are synthesized from prefix listings and
//! empty `dir/` markers, symlinks are empty objects carrying the target URI in
//! a provider specific metadata key.

use crate::backend::{
    Backend, ChunkStream, ClientHandle, Metadata, RmtreeOptions, Stat, WalkEntry,
    DEFAULT_CHUNK_SIZE,
};
use crate::config::Config;
use crate::emulation::{glob_candidates, group_walk, needs_full_listing, KeyMatcher};
use crate::store::{ObjectClient, ObjectInfo};
use crate::value::PathValue;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Default symlink metadata key (S3 and memory convention)
pub const DEFAULT_SYMLINK_KEY: &str = "symlink-target";

/// Object-store backend over a flat key client
#[derive(Clone)]
pub struct ObjectBackend {
    client: Arc<dyn ObjectClient>,
    tag: String,
    symlink_key: String,
    chunk_size: usize,
}

impl fmt::Debug for ObjectBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBackend")
            .field("tag", &self.tag)
            .field("client", &self.client)
            .field("symlink_key", &self.symlink_key)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl ObjectBackend {
    /// Wrap `client`; `tag` is the scheme reported in [`Stat::backend`]
    pub fn new(tag: impl Into<String>, client: Arc<dyn ObjectClient>) -> Self {
        Self {
            client,
            tag: tag.into(),
            symlink_key: DEFAULT_SYMLINK_KEY.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Apply the chunk size and the symlink key configured for `tag`
    pub fn from_config(
        tag: impl Into<String>,
        client: Arc<dyn ObjectClient>,
        config: &Config,
    ) -> Self {
        let tag = tag.into();
        let symlink_key = config.symlinks.key_for(&tag).to_string();
        Self::new(tag, client)
            .with_symlink_key(symlink_key)
            .with_chunk_size(config.chunk_size())
    }

    pub fn with_symlink_key(mut self, key: impl Into<String>) -> Self {
        self.symlink_key = key.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.client
    }

    pub fn symlink_key(&self) -> &str {
        &self.symlink_key
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn head(&self, path: &PathValue) -> Result<Option<ObjectInfo>> {
        if path.is_root() {
            return Ok(None);
        }
        self.client.head(path.bucket(), &path.key()).await
    }

    fn dir_stat(&self) -> Stat {
        Stat {
            size: 0,
            modified: None,
            is_dir: true,
            backend: self.tag.clone(),
            device: None,
            etag: None,
        }
    }

    /// Error for a missing file: a directory at the same path changes the kind
    async fn missing_file(&self, path: &PathValue) -> Error {
        match self.is_dir(path).await {
            Ok(true) => Error::IsADirectory(path.to_string()),
            Ok(false) => Error::NotFound(path.to_string()),
            Err(err) => err,
        }
    }

    async fn put_marker(&self, path: &PathValue) -> Result<()> {
        trace!("creating directory marker for {}", path);
        self.client
            .put(path.bucket(), &path.dir_prefix(), Bytes::new(), Metadata::new())
            .await
    }

    /// Resolve a symlink object to the same-store key it points at
    fn link_source(&self, info: &ObjectInfo, path: &PathValue) -> Option<PathValue> {
        let target = info.metadata.get(&self.symlink_key)?;
        let target = PathValue::parse(target).ok()?;
        (target.scheme() == path.scheme() && !target.is_root()).then_some(target)
    }
}

impl ClientHandle for ObjectBackend {
    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    fn close(&self) {
        self.client.close();
    }
}

#[async_trait]
impl Backend for ObjectBackend {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn exists(&self, path: &PathValue) -> Result<bool> {
        if path.is_root() {
            return self.client.bucket_exists(path.bucket()).await;
        }
        if self.head(path).await?.is_some() {
            return Ok(true);
        }
        self.is_dir(path).await
    }

    async fn read_bytes(&self, path: &PathValue) -> Result<Bytes> {
        if path.is_root() {
            return Err(Error::IsADirectory(path.to_string()));
        }
        debug!("reading {}", path);
        match self.client.get(path.bucket(), &path.key()).await {
            Err(err) if err.is_not_found() => Err(self.missing_file(path).await),
            other => other,
        }
    }

    async fn write_bytes(&self, path: &PathValue, data: Bytes) -> Result<()> {
        if path.is_root() {
            return Err(Error::IsADirectory(path.to_string()));
        }
        debug!("writing {} bytes to {}", data.len(), path);
        self.client
            .put(path.bucket(), &path.key(), data, Metadata::new())
            .await
    }

    async fn read_stream(&self, path: &PathValue, chunk_size: usize) -> Result<ChunkStream> {
        if path.is_root() {
            return Err(Error::IsADirectory(path.to_string()));
        }
        let chunk_size = if chunk_size == 0 {
            self.chunk_size
        } else {
            chunk_size
        };
        match self
            .client
            .get_stream(path.bucket(), &path.key(), chunk_size)
            .await
        {
            Err(err) if err.is_not_found() => Err(self.missing_file(path).await),
            other => other,
        }
    }

    async fn delete(&self, path: &PathValue) -> Result<()> {
        if path.is_root() {
            return Err(Error::IsADirectory(path.to_string()));
        }
        if self.head(path).await?.is_none() {
            return Err(self.missing_file(path).await);
        }
        debug!("deleting {}", path);
        self.client.delete(path.bucket(), &path.key()).await
    }

    async fn list_dir(&self, path: &PathValue) -> Result<Vec<PathValue>> {
        let prefix = path.dir_prefix();
        let listing = self.client.list(path.bucket(), &prefix, true).await?;

        if listing.is_empty() {
            if path.is_root() && self.client.bucket_exists(path.bucket()).await? {
                return Ok(Vec::new());
            }
            if self.head(path).await?.is_some() {
                return Err(Error::NotADirectory(path.to_string()));
            }
            return Err(Error::NotFound(path.to_string()));
        }

        let mut children: Vec<PathValue> = listing
            .objects
            .iter()
            .filter(|object| object.key != prefix)
            .filter_map(|object| object.key.strip_prefix(&prefix))
            .chain(
                listing
                    .common_prefixes
                    .iter()
                    .filter_map(|common| common.strip_prefix(&prefix)),
            )
            .map(|name| path.join(name.trim_end_matches('/')))
            .collect();
        children.sort();
        children.dedup();
        Ok(children)
    }

    async fn is_dir(&self, path: &PathValue) -> Result<bool> {
        if path.is_root() {
            return self.client.bucket_exists(path.bucket()).await;
        }
        let listing = self
            .client
            .list(path.bucket(), &path.dir_prefix(), true)
            .await?;
        Ok(!listing.is_empty())
    }

    async fn is_file(&self, path: &PathValue) -> Result<bool> {
        Ok(self.head(path).await?.is_some())
    }

    async fn stat(&self, path: &PathValue) -> Result<Stat> {
        if let Some(info) = self.head(path).await? {
            return Ok(Stat {
                size: info.size,
                modified: info.last_modified,
                is_dir: false,
                backend: self.tag.clone(),
                device: None,
                etag: info.etag,
            });
        }
        if self.is_dir(path).await? {
            return Ok(self.dir_stat());
        }
        Err(Error::NotFound(path.to_string()))
    }

    async fn mkdir(&self, path: &PathValue, parents: bool, exist_ok: bool) -> Result<()> {
        if path.is_root() || self.head(path).await?.is_some() || self.is_dir(path).await? {
            if exist_ok {
                return Ok(());
            }
            return Err(Error::AlreadyExists(path.to_string()));
        }

        let parent = path.parent();
        if !parent.is_root() && !self.is_dir(&parent).await? {
            if !parents {
                return Err(Error::NotFound(parent.to_string()));
            }
            // Root first so every level exists before its children
            for ancestor in path.ancestors().iter().rev().filter(|a| !a.is_root()) {
                if self.head(ancestor).await?.is_some() {
                    return Err(Error::NotADirectory(ancestor.to_string()));
                }
                if !self.is_dir(ancestor).await? {
                    self.put_marker(ancestor).await?;
                }
            }
        }

        debug!("mkdir {}", path);
        self.put_marker(path).await
    }

    async fn glob(&self, path: &PathValue, pattern: &str) -> Result<Vec<PathValue>> {
        let matcher = KeyMatcher::new(pattern)?;
        if !path.is_root() && self.head(path).await?.is_some() {
            return Err(Error::NotADirectory(path.to_string()));
        }
        let prefix = path.dir_prefix();
        let recursive = needs_full_listing(pattern);
        let listing = self.client.list(path.bucket(), &prefix, !recursive).await?;

        if listing.is_empty() && !path.is_root() && self.head(path).await?.is_none() {
            return Err(Error::NotFound(path.to_string()));
        }

        let matches: Vec<PathValue> = glob_candidates(&prefix, &listing)
            .into_iter()
            .filter(|rel| matcher.matches(rel))
            .map(|rel| path.join(&rel))
            .collect();
        trace!("glob {} {:?}: {} matches", path, pattern, matches.len());
        Ok(matches)
    }

    async fn walk(&self, path: &PathValue) -> Result<Vec<WalkEntry<PathValue>>> {
        if self.head(path).await?.is_some() {
            return Err(Error::NotADirectory(path.to_string()));
        }
        let prefix = path.dir_prefix();
        let listing = self.client.list(path.bucket(), &prefix, false).await?;
        if listing.is_empty() && !path.is_root() {
            return Err(Error::NotFound(path.to_string()));
        }

        let groups = group_walk(&prefix, listing.objects.iter().map(|o| o.key.as_str()));
        Ok(groups
            .into_iter()
            .map(|group| WalkEntry {
                dirpath: path.join(&group.dir.join("/")),
                dirnames: group.dirnames.into_iter().collect(),
                filenames: group.filenames.into_iter().collect(),
            })
            .collect())
    }

    async fn touch(&self, path: &PathValue, exist_ok: bool) -> Result<()> {
        // Directories count as existing
        if self.exists(path).await? {
            if exist_ok {
                return Ok(());
            }
            return Err(Error::AlreadyExists(path.to_string()));
        }
        self.write_bytes(path, Bytes::new()).await
    }

    async fn rename(&self, src: &PathValue, dst: &PathValue) -> Result<()> {
        debug!("rename {} -> {}", src, dst);
        let same_key = src.bucket() == dst.bucket() && src.key() == dst.key();
        if self.head(src).await?.is_some() {
            if same_key {
                return Ok(());
            }
            self.client
                .copy(src.bucket(), &src.key(), dst.bucket(), &dst.key())
                .await?;
            return self.client.delete(src.bucket(), &src.key()).await;
        }
        if self.is_dir(src).await? {
            if same_key {
                return Ok(());
            }
            self.copytree(src, dst, false).await?;
            return self.rmtree(src, &RmtreeOptions::default()).await;
        }
        Err(Error::NotFound(src.to_string()))
    }

    async fn rmdir(&self, path: &PathValue) -> Result<()> {
        if path.is_root() {
            return Err(Error::UnsupportedOperation(format!(
                "cannot remove bucket root {path}"
            )));
        }
        if self.head(path).await?.is_some() {
            return Err(Error::NotADirectory(path.to_string()));
        }

        let prefix = path.dir_prefix();
        let listing = self.client.list(path.bucket(), &prefix, true).await?;
        let has_marker = listing.objects.iter().any(|o| o.key == prefix);
        let has_children =
            !listing.common_prefixes.is_empty() || listing.objects.iter().any(|o| o.key != prefix);

        if has_children {
            return Err(Error::DirectoryNotEmpty(path.to_string()));
        }
        if !has_marker {
            return Err(Error::NotFound(path.to_string()));
        }
        debug!("rmdir {}", path);
        self.client.delete(path.bucket(), &prefix).await
    }

    async fn rmtree(&self, path: &PathValue, options: &RmtreeOptions) -> Result<()> {
        let display = path.to_string();
        if self.head(path).await?.is_some() {
            return options.handle("rmtree", &display, Error::NotADirectory(display.clone()));
        }

        let prefix = path.dir_prefix();
        let listing = self.client.list(path.bucket(), &prefix, false).await?;
        if listing.is_empty() && !path.is_root() {
            return options.handle("rmtree", &display, Error::NotFound(display.clone()));
        }

        debug!("rmtree {}: {} keys", path, listing.objects.len());
        for object in &listing.objects {
            if let Err(err) = self.client.delete(path.bucket(), &object.key).await {
                let key = format!("{}://{}/{}", self.tag, path.bucket(), object.key);
                options.handle("delete", &key, err)?;
            }
        }
        Ok(())
    }

    async fn copy(&self, src: &PathValue, dst: &PathValue, follow_symlinks: bool) -> Result<()> {
        let Some(info) = self.head(src).await? else {
            return Err(self.missing_file(src).await);
        };
        let source = if follow_symlinks {
            self.link_source(&info, src).unwrap_or_else(|| src.clone())
        } else {
            src.clone()
        };
        debug!("copy {} -> {} (via {})", src, dst, source);
        self.client
            .copy(source.bucket(), &source.key(), dst.bucket(), &dst.key())
            .await
    }

    async fn copytree(
        &self,
        src: &PathValue,
        dst: &PathValue,
        follow_symlinks: bool,
    ) -> Result<()> {
        if self.head(src).await?.is_some() {
            return Err(Error::NotADirectory(src.to_string()));
        }
        let prefix = src.dir_prefix();
        let listing = self.client.list(src.bucket(), &prefix, false).await?;
        if listing.is_empty() {
            return Err(Error::NotFound(src.to_string()));
        }

        let dst_prefix = dst.dir_prefix();
        debug!("copytree {} -> {}: {} keys", src, dst, listing.objects.len());
        for object in &listing.objects {
            let Some(rel) = object.key.strip_prefix(&prefix) else {
                continue;
            };
            let target_key = format!("{dst_prefix}{rel}");
            if target_key.is_empty() {
                continue;
            }
            let mut source = (src.bucket().to_string(), object.key.clone());
            if follow_symlinks && !object.is_marker() {
                let object_path = src.join(rel);
                if let Some(info) = self.head(&object_path).await? {
                    if let Some(target) = self.link_source(&info, src) {
                        source = (target.bucket().to_string(), target.key());
                    }
                }
            }
            self.client
                .copy(&source.0, &source.1, dst.bucket(), &target_key)
                .await?;
        }
        Ok(())
    }

    async fn get_metadata(&self, path: &PathValue) -> Result<Metadata> {
        match self.head(path).await? {
            Some(info) => Ok(info.metadata),
            None => Err(self.missing_file(path).await),
        }
    }

    async fn set_metadata(&self, path: &PathValue, mut metadata: Metadata) -> Result<()> {
        let Some(info) = self.head(path).await? else {
            return Err(self.missing_file(path).await);
        };
        // The link target lives in the same metadata map
        if let Some(target) = info.metadata.get(&self.symlink_key) {
            metadata.insert(self.symlink_key.clone(), target.clone());
        }
        let data = self.client.get(path.bucket(), &path.key()).await?;
        self.client
            .put(path.bucket(), &path.key(), data, metadata)
            .await
    }

    async fn symlink_to(&self, path: &PathValue, target: &str) -> Result<()> {
        if path.is_root() {
            return Err(Error::InvalidArgument(format!("{path} cannot be a symlink")));
        }
        if self.head(path).await?.is_some() {
            return Err(Error::AlreadyExists(path.to_string()));
        }
        debug!("symlink {} -> {}", path, target);
        let mut metadata = Metadata::new();
        metadata.insert(self.symlink_key.clone(), target.to_string());
        self.client
            .put(path.bucket(), &path.key(), Bytes::new(), metadata)
            .await
    }

    async fn readlink(&self, path: &PathValue) -> Result<String> {
        let Some(info) = self.head(path).await? else {
            return Err(Error::NotFound(path.to_string()));
        };
        info.metadata
            .get(&self.symlink_key)
            .cloned()
            .ok_or_else(|| Error::InvalidArgument(format!("{path} is not a symlink")))
    }

    async fn is_symlink(&self, path: &PathValue) -> Result<bool> {
        Ok(self
            .head(path)
            .await?
            .is_some_and(|info| info.metadata.contains_key(&self.symlink_key)))
    }
}
