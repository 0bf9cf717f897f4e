//! The backend client contract
//!
//! Every storage backend implements [`Backend`] (suspend mode) and/or
//! [`BlockingBackend`] (blocking mode). The path layer, the file handles and
//! the transfer coordinator are written only against these two traits, so a
//! new backend is a new implementation plus a registry entry.
//!
//! Paths are passed as [`PathValue`]s; a backend only looks at the parts it
//! understands (bucket and key for object stores, the native path for disks).

use crate::value::PathValue;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Default chunk size for streaming reads (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Object metadata (user-defined key/value pairs)
pub type Metadata = BTreeMap<String, String>;

/// Chunk stream produced by a backend's streaming download primitive
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

/// Blocking counterpart of [`ChunkStream`]
pub type ChunkIter = Box<dyn Iterator<Item = Result<Bytes>> + Send>;

/// Normalized stat record every backend populates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Last modification time, when the backend knows it
    pub modified: Option<DateTime<Utc>>,
    /// Whether the path is a (possibly synthesized) directory
    pub is_dir: bool,
    /// Backend tag (`file`, `s3`, `memory`, ...)
    pub backend: String,
    /// Device number for local files
    pub device: Option<u64>,
    /// Entity tag for objects
    pub etag: Option<String>,
}

/// One level of a directory walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry<P> {
    /// Directory being described
    pub dirpath: P,
    /// Names of its subdirectories, sorted
    pub dirnames: Vec<String>,
    /// Names of its files, sorted
    pub filenames: Vec<String>,
}

impl<P> WalkEntry<P> {
    /// Change the directory representation, keeping the names
    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> WalkEntry<Q> {
        WalkEntry {
            dirpath: f(self.dirpath),
            dirnames: self.dirnames,
            filenames: self.filenames,
        }
    }
}

/// Callback invoked by rmtree for every failure: (operation, path, error)
pub type OnError = Arc<dyn Fn(&str, &str, &Error) + Send + Sync>;

/// Error policy for rmtree
#[derive(Clone, Default)]
pub struct RmtreeOptions {
    /// Swallow every error
    pub ignore_errors: bool,
    /// Report errors here and keep going
    pub onerror: Option<OnError>,
}

impl RmtreeOptions {
    pub fn ignore_errors() -> Self {
        Self {
            ignore_errors: true,
            onerror: None,
        }
    }

    pub fn with_onerror(onerror: OnError) -> Self {
        Self {
            ignore_errors: false,
            onerror: Some(onerror),
        }
    }

    /// Route `err` through the policy; `Err` means the caller must stop
    pub(crate) fn handle(&self, op: &str, path: &str, err: Error) -> Result<()> {
        if self.ignore_errors {
            tracing::debug!("rmtree: ignoring {} failure on {}: {}", op, path, err);
            return Ok(());
        }
        match &self.onerror {
            Some(callback) => {
                callback(op, path, &err);
                Ok(())
            }
            None => Err(err),
        }
    }
}

impl fmt::Debug for RmtreeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RmtreeOptions")
            .field("ignore_errors", &self.ignore_errors)
            .field("onerror", &self.onerror.is_some())
            .finish()
    }
}

/// Lifecycle shared by both client flavours
pub trait ClientHandle: Send + Sync {
    /// True once the transport session is gone and the client must be rebuilt
    fn is_closed(&self) -> bool {
        false
    }

    /// Release the transport session
    fn close(&self) {}
}

pub(crate) fn decode_utf8(data: Bytes, path: &PathValue) -> Result<String> {
    String::from_utf8(data.to_vec())
        .map_err(|e| Error::InvalidArgument(format!("{path} is not valid UTF-8: {e}")))
}

/// Suspend-mode backend client
#[async_trait]
pub trait Backend: ClientHandle + fmt::Debug {
    /// Tag recorded in [`Stat::backend`]
    fn tag(&self) -> &str;

    async fn exists(&self, path: &PathValue) -> Result<bool>;

    async fn read_bytes(&self, path: &PathValue) -> Result<Bytes>;

    async fn read_text(&self, path: &PathValue) -> Result<String> {
        let data = self.read_bytes(path).await?;
        decode_utf8(data, path)
    }

    /// Whole-object upload
    async fn write_bytes(&self, path: &PathValue, data: Bytes) -> Result<()>;

    async fn write_text(&self, path: &PathValue, data: &str) -> Result<()> {
        self.write_bytes(path, Bytes::copy_from_slice(data.as_bytes()))
            .await
    }

    /// Streaming download primitive backing [`crate::handle::FileHandle`]
    async fn read_stream(&self, path: &PathValue, chunk_size: usize) -> Result<ChunkStream>;

    /// Remove a file; directories fail with `IsADirectory`
    async fn delete(&self, path: &PathValue) -> Result<()>;

    /// One level, flat
    async fn list_dir(&self, path: &PathValue) -> Result<Vec<PathValue>>;

    async fn is_dir(&self, path: &PathValue) -> Result<bool>;

    async fn is_file(&self, path: &PathValue) -> Result<bool>;

    async fn stat(&self, path: &PathValue) -> Result<Stat>;

    async fn mkdir(&self, path: &PathValue, parents: bool, exist_ok: bool) -> Result<()>;

    async fn glob(&self, path: &PathValue, pattern: &str) -> Result<Vec<PathValue>>;

    async fn walk(&self, path: &PathValue) -> Result<Vec<WalkEntry<PathValue>>>;

    async fn touch(&self, path: &PathValue, exist_ok: bool) -> Result<()>;

    /// Native same-backend move
    async fn rename(&self, src: &PathValue, dst: &PathValue) -> Result<()>;

    async fn rmdir(&self, path: &PathValue) -> Result<()>;

    async fn rmtree(&self, path: &PathValue, options: &RmtreeOptions) -> Result<()>;

    /// Native same-backend copy
    async fn copy(&self, src: &PathValue, dst: &PathValue, follow_symlinks: bool) -> Result<()>;

    async fn copytree(&self, src: &PathValue, dst: &PathValue, follow_symlinks: bool)
        -> Result<()>;

    async fn get_metadata(&self, path: &PathValue) -> Result<Metadata>;

    async fn set_metadata(&self, path: &PathValue, metadata: Metadata) -> Result<()>;

    /// `target` is stored verbatim
    async fn symlink_to(&self, path: &PathValue, target: &str) -> Result<()>;

    async fn readlink(&self, path: &PathValue) -> Result<String>;

    async fn is_symlink(&self, path: &PathValue) -> Result<bool>;
}

/// Blocking-mode backend client
pub trait BlockingBackend: ClientHandle + fmt::Debug {
    /// Tag recorded in [`Stat::backend`]
    fn tag(&self) -> &str;

    fn exists(&self, path: &PathValue) -> Result<bool>;

    fn read_bytes(&self, path: &PathValue) -> Result<Bytes>;

    fn read_text(&self, path: &PathValue) -> Result<String> {
        let data = self.read_bytes(path)?;
        decode_utf8(data, path)
    }

    fn write_bytes(&self, path: &PathValue, data: Bytes) -> Result<()>;

    fn write_text(&self, path: &PathValue, data: &str) -> Result<()> {
        self.write_bytes(path, Bytes::copy_from_slice(data.as_bytes()))
    }

    fn read_stream(&self, path: &PathValue, chunk_size: usize) -> Result<ChunkIter>;

    fn delete(&self, path: &PathValue) -> Result<()>;

    fn list_dir(&self, path: &PathValue) -> Result<Vec<PathValue>>;

    fn is_dir(&self, path: &PathValue) -> Result<bool>;

    fn is_file(&self, path: &PathValue) -> Result<bool>;

    fn stat(&self, path: &PathValue) -> Result<Stat>;

    fn mkdir(&self, path: &PathValue, parents: bool, exist_ok: bool) -> Result<()>;

    fn glob(&self, path: &PathValue, pattern: &str) -> Result<Vec<PathValue>>;

    fn walk(&self, path: &PathValue) -> Result<Vec<WalkEntry<PathValue>>>;

    fn touch(&self, path: &PathValue, exist_ok: bool) -> Result<()>;

    fn rename(&self, src: &PathValue, dst: &PathValue) -> Result<()>;

    fn rmdir(&self, path: &PathValue) -> Result<()>;

    fn rmtree(&self, path: &PathValue, options: &RmtreeOptions) -> Result<()>;

    fn copy(&self, src: &PathValue, dst: &PathValue, follow_symlinks: bool) -> Result<()>;

    fn copytree(&self, src: &PathValue, dst: &PathValue, follow_symlinks: bool) -> Result<()>;

    fn get_metadata(&self, path: &PathValue) -> Result<Metadata>;

    fn set_metadata(&self, path: &PathValue, metadata: Metadata) -> Result<()>;

    fn symlink_to(&self, path: &PathValue, target: &str) -> Result<()>;

    fn readlink(&self, path: &PathValue) -> Result<String>;

    fn is_symlink(&self, path: &PathValue) -> Result<bool>;
}
