//! Testing utilities and fixtures for polypath
//!
//! This crate provides scratch locations on every backend (a temporary local
//! directory, a private in-memory store, a unique bucket on the shared memory
//! store), the canonical test tree and tree assertions.

use anyhow::Result;
use polypath_core::bridge::Blocking;
use polypath_core::memory::MemoryClient;
use polypath_core::object::ObjectBackend;
use polypath_core::{AsyncPath, Backend, BlockingBackend, BlockingPath};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub mod assertions;
pub mod fixtures;
pub mod helpers;

/// Creates a temporary test directory with cleanup on drop
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    /// Creates a new temporary test directory
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    /// Returns the path to the temporary directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The directory as a blocking local path
    pub fn root(&self) -> Result<BlockingPath> {
        Ok(BlockingPath::new(self.dir.path())?)
    }

    /// The directory as a suspend-mode local path
    pub fn async_root(&self) -> Result<AsyncPath> {
        Ok(AsyncPath::new(self.dir.path())?)
    }

    /// Creates a file with the given name and content in the test directory
    pub fn create_file(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Creates a directory with the given name in the test directory
    pub fn create_dir(&self, name: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }
}

/// Bucket name no other test in this process will pick
pub fn unique_bucket(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!(
        "{}-{}-{}",
        prefix,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

/// A private in-memory store, reachable only through paths it hands out
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    client: MemoryClient,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> &MemoryClient {
        &self.client
    }

    /// Blocking `memory://` path served by this store
    pub fn path(&self, uri: &str) -> Result<BlockingPath> {
        let backend: Arc<dyn BlockingBackend> = Arc::new(Blocking::new(ObjectBackend::new(
            "memory",
            Arc::new(self.client.clone()),
        )));
        Ok(BlockingPath::new(uri)?.with_client(backend))
    }

    /// Suspend-mode `memory://` path served by this store
    pub fn async_path(&self, uri: &str) -> Result<AsyncPath> {
        let backend: Arc<dyn Backend> =
            Arc::new(ObjectBackend::new("memory", Arc::new(self.client.clone())));
        Ok(AsyncPath::new(uri)?.with_client(backend))
    }
}
