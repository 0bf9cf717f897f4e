//! Blocking adapter over suspend-mode backends
//!
//! Object-store clients are natively async. [`Blocking`] exposes any
//! [`Backend`] through the [`BlockingBackend`] contract by driving each call on
//! the shared runtime from [`crate::runtime`].

use crate::backend::{
    Backend, BlockingBackend, ChunkIter, ChunkStream, ClientHandle, Metadata, RmtreeOptions, Stat,
    WalkEntry,
};
use crate::runtime::block_on;
use crate::value::PathValue;
use crate::Result;
use bytes::Bytes;
use futures_util::StreamExt;
use std::fmt;
use std::sync::Arc;

/// Blocking view of a suspend-mode backend
pub struct Blocking<B: ?Sized> {
    inner: Arc<B>,
}

impl<B: ?Sized> Clone for Blocking<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: ?Sized + fmt::Debug> fmt::Debug for Blocking<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Blocking").field(&self.inner).finish()
    }
}

impl<B: Backend> Blocking<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl<B: ?Sized + Backend> Blocking<B> {
    /// Share an existing suspend-mode client
    pub fn from_arc(inner: Arc<B>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<B> {
        &self.inner
    }
}

/// Iterator pulling one chunk at a time from a stream
struct StreamChunks {
    stream: ChunkStream,
}

impl Iterator for StreamChunks {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        block_on(self.stream.next())
    }
}

impl<B: ?Sized + Backend> ClientHandle for Blocking<B> {
    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn close(&self) {
        self.inner.close();
    }
}

impl<B: ?Sized + Backend> BlockingBackend for Blocking<B> {
    fn tag(&self) -> &str {
        self.inner.tag()
    }

    fn exists(&self, path: &PathValue) -> Result<bool> {
        block_on(self.inner.exists(path))
    }

    fn read_bytes(&self, path: &PathValue) -> Result<Bytes> {
        block_on(self.inner.read_bytes(path))
    }

    fn read_text(&self, path: &PathValue) -> Result<String> {
        block_on(self.inner.read_text(path))
    }

    fn write_bytes(&self, path: &PathValue, data: Bytes) -> Result<()> {
        block_on(self.inner.write_bytes(path, data))
    }

    fn write_text(&self, path: &PathValue, data: &str) -> Result<()> {
        block_on(self.inner.write_text(path, data))
    }

    fn read_stream(&self, path: &PathValue, chunk_size: usize) -> Result<ChunkIter> {
        let stream = block_on(self.inner.read_stream(path, chunk_size))?;
        Ok(Box::new(StreamChunks { stream }))
    }

    fn delete(&self, path: &PathValue) -> Result<()> {
        block_on(self.inner.delete(path))
    }

    fn list_dir(&self, path: &PathValue) -> Result<Vec<PathValue>> {
        block_on(self.inner.list_dir(path))
    }

    fn is_dir(&self, path: &PathValue) -> Result<bool> {
        block_on(self.inner.is_dir(path))
    }

    fn is_file(&self, path: &PathValue) -> Result<bool> {
        block_on(self.inner.is_file(path))
    }

    fn stat(&self, path: &PathValue) -> Result<Stat> {
        block_on(self.inner.stat(path))
    }

    fn mkdir(&self, path: &PathValue, parents: bool, exist_ok: bool) -> Result<()> {
        block_on(self.inner.mkdir(path, parents, exist_ok))
    }

    fn glob(&self, path: &PathValue, pattern: &str) -> Result<Vec<PathValue>> {
        block_on(self.inner.glob(path, pattern))
    }

    fn walk(&self, path: &PathValue) -> Result<Vec<WalkEntry<PathValue>>> {
        block_on(self.inner.walk(path))
    }

    fn touch(&self, path: &PathValue, exist_ok: bool) -> Result<()> {
        block_on(self.inner.touch(path, exist_ok))
    }

    fn rename(&self, src: &PathValue, dst: &PathValue) -> Result<()> {
        block_on(self.inner.rename(src, dst))
    }

    fn rmdir(&self, path: &PathValue) -> Result<()> {
        block_on(self.inner.rmdir(path))
    }

    fn rmtree(&self, path: &PathValue, options: &RmtreeOptions) -> Result<()> {
        block_on(self.inner.rmtree(path, options))
    }

    fn copy(&self, src: &PathValue, dst: &PathValue, follow_symlinks: bool) -> Result<()> {
        block_on(self.inner.copy(src, dst, follow_symlinks))
    }

    fn copytree(&self, src: &PathValue, dst: &PathValue, follow_symlinks: bool) -> Result<()> {
        block_on(self.inner.copytree(src, dst, follow_symlinks))
    }

    fn get_metadata(&self, path: &PathValue) -> Result<Metadata> {
        block_on(self.inner.get_metadata(path))
    }

    fn set_metadata(&self, path: &PathValue, metadata: Metadata) -> Result<()> {
        block_on(self.inner.set_metadata(path, metadata))
    }

    fn symlink_to(&self, path: &PathValue, target: &str) -> Result<()> {
        block_on(self.inner.symlink_to(path, target))
    }

    fn readlink(&self, path: &PathValue) -> Result<String> {
        block_on(self.inner.readlink(path))
    }

    fn is_symlink(&self, path: &PathValue) -> Result<bool> {
        block_on(self.inner.is_symlink(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;
    use crate::object::ObjectBackend;

    fn blocking() -> Blocking<ObjectBackend> {
        Blocking::new(ObjectBackend::new("memory", Arc::new(MemoryClient::new())))
    }

    #[test]
    fn test_blocking_round_trip() {
        let backend = blocking();
        let path = PathValue::parse("memory://b/k.txt").unwrap();
        backend.write_text(&path, "payload").unwrap();
        assert_eq!(backend.read_text(&path).unwrap(), "payload");
        assert!(backend.is_file(&path).unwrap());
        assert_eq!(backend.tag(), "memory");
    }

    #[test]
    fn test_blocking_stream() {
        let backend = blocking();
        let path = PathValue::parse("memory://b/digits").unwrap();
        backend.write_text(&path, "0123456789").unwrap();
        let chunks: Vec<Bytes> = backend
            .read_stream(&path, 4)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(chunks, vec![&b"0123"[..], &b"4567"[..], &b"89"[..]]);
    }

    #[tokio::test]
    async fn test_blocking_inside_async_context() {
        let backend = blocking();
        let path = PathValue::parse("memory://b/nested").unwrap();
        backend.write_text(&path, "ok").unwrap();
        assert_eq!(backend.read_text(&path).unwrap(), "ok");
    }
}
