//! Local disk backend
//!
//! Blocking mode calls `std::fs` directly. Suspend mode streams file contents
//! with `tokio::fs` and runs every other operation on the blocking pool.

use crate::backend::{
    Backend, BlockingBackend, ChunkIter, ChunkStream, ClientHandle, Metadata, RmtreeOptions, Stat,
    WalkEntry, DEFAULT_CHUNK_SIZE,
};
use crate::config::Config;
use crate::value::PathValue;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Backend tag for local paths
pub const LOCAL_TAG: &str = "file";

/// Local filesystem backend
#[derive(Debug, Clone)]
pub struct LocalBackend {
    chunk_size: usize,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn io_err(err: std::io::Error, path: &Path) -> Error {
    Error::from_io(err, path.display().to_string())
}

/// A file standing in for a parent directory means the path is absent
fn existence(found: std::io::Result<bool>, native: &Path) -> Result<bool> {
    match found {
        Err(err) if err.kind() == std::io::ErrorKind::NotADirectory => Ok(false),
        other => other.map_err(|e| io_err(e, native)),
    }
}

fn read_chunk(file: &mut File, chunk_size: usize) -> Result<Option<Bytes>> {
    let mut buf = BytesMut::zeroed(chunk_size);
    let n = file.read(&mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some(buf.freeze()))
}

async fn next_chunk(
    mut file: tokio::fs::File,
    chunk_size: usize,
) -> Result<Option<(Bytes, tokio::fs::File)>> {
    let mut buf = BytesMut::zeroed(chunk_size);
    let n = file.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some((buf.freeze(), file)))
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| io_err(e, link))
}

#[cfg(not(unix))]
fn create_symlink(_target: &Path, link: &Path) -> Result<()> {
    Err(Error::UnsupportedOperation(format!(
        "symlinks are not supported here: {}",
        link.display()
    )))
}

#[cfg(unix)]
fn device_of(metadata: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.dev())
}

#[cfg(not(unix))]
fn device_of(_metadata: &fs::Metadata) -> Option<u64> {
    None
}

impl LocalBackend {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new().with_chunk_size(config.chunk_size())
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn native(path: &PathValue) -> PathBuf {
        path.to_path_buf()
    }

    fn chunk_size_or_default(&self, chunk_size: usize) -> usize {
        if chunk_size == 0 {
            self.chunk_size
        } else {
            chunk_size
        }
    }

    /// Run a blocking operation on Tokio's blocking pool
    async fn offload<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(LocalBackend) -> Result<T> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || op(this))
            .await
            .map_err(|e| Error::Runtime(format!("blocking task failed: {e}")))?
    }

    fn copy_entry(src: &Path, dst: &Path, follow_symlinks: bool) -> Result<()> {
        let meta = fs::symlink_metadata(src).map_err(|e| io_err(e, src))?;
        if meta.file_type().is_symlink() && !follow_symlinks {
            let target = fs::read_link(src).map_err(|e| io_err(e, src))?;
            trace!("recreating symlink {} -> {}", dst.display(), target.display());
            return create_symlink(&target, dst);
        }
        fs::copy(src, dst).map_err(|e| io_err(e, src))?;
        Ok(())
    }
}

impl ClientHandle for LocalBackend {}

impl BlockingBackend for LocalBackend {
    fn tag(&self) -> &str {
        LOCAL_TAG
    }

    fn exists(&self, path: &PathValue) -> Result<bool> {
        let native = Self::native(path);
        existence(native.try_exists(), &native)
    }

    fn read_bytes(&self, path: &PathValue) -> Result<Bytes> {
        let native = Self::native(path);
        if native.is_dir() {
            return Err(Error::IsADirectory(path.to_string()));
        }
        let data = fs::read(&native).map_err(|e| io_err(e, &native))?;
        Ok(Bytes::from(data))
    }

    fn write_bytes(&self, path: &PathValue, data: Bytes) -> Result<()> {
        let native = Self::native(path);
        debug!("writing {} bytes to {}", data.len(), native.display());
        fs::write(&native, &data).map_err(|e| io_err(e, &native))
    }

    fn read_stream(&self, path: &PathValue, chunk_size: usize) -> Result<ChunkIter> {
        let native = Self::native(path);
        if native.is_dir() {
            return Err(Error::IsADirectory(path.to_string()));
        }
        let mut file = File::open(&native).map_err(|e| io_err(e, &native))?;
        let chunk_size = self.chunk_size_or_default(chunk_size);
        let mut done = false;
        Ok(Box::new(std::iter::from_fn(move || {
            if done {
                return None;
            }
            match read_chunk(&mut file, chunk_size) {
                Ok(Some(chunk)) => Some(Ok(chunk)),
                Ok(None) => {
                    done = true;
                    None
                }
                Err(err) => {
                    done = true;
                    Some(Err(err))
                }
            }
        })))
    }

    fn delete(&self, path: &PathValue) -> Result<()> {
        let native = Self::native(path);
        let meta = fs::symlink_metadata(&native).map_err(|e| io_err(e, &native))?;
        if meta.is_dir() {
            return Err(Error::IsADirectory(path.to_string()));
        }
        debug!("deleting {}", native.display());
        fs::remove_file(&native).map_err(|e| io_err(e, &native))
    }

    fn list_dir(&self, path: &PathValue) -> Result<Vec<PathValue>> {
        let native = Self::native(path);
        let mut children = Vec::new();
        for entry in fs::read_dir(&native).map_err(|e| io_err(e, &native))? {
            let entry = entry.map_err(|e| io_err(e, &native))?;
            children.push(path.join(&entry.file_name().to_string_lossy()));
        }
        children.sort();
        Ok(children)
    }

    fn is_dir(&self, path: &PathValue) -> Result<bool> {
        Ok(Self::native(path).is_dir())
    }

    fn is_file(&self, path: &PathValue) -> Result<bool> {
        Ok(Self::native(path).is_file())
    }

    fn stat(&self, path: &PathValue) -> Result<Stat> {
        let native = Self::native(path);
        let meta = fs::metadata(&native).map_err(|e| io_err(e, &native))?;
        Ok(Stat {
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
            is_dir: meta.is_dir(),
            backend: LOCAL_TAG.to_string(),
            device: device_of(&meta),
            etag: None,
        })
    }

    fn mkdir(&self, path: &PathValue, parents: bool, exist_ok: bool) -> Result<()> {
        let native = Self::native(path);
        if native.exists() {
            if exist_ok && native.is_dir() {
                return Ok(());
            }
            return Err(Error::AlreadyExists(path.to_string()));
        }
        debug!("mkdir {}", native.display());
        let result = if parents {
            fs::create_dir_all(&native)
        } else {
            fs::create_dir(&native)
        };
        result.map_err(|e| io_err(e, &native))
    }

    fn glob(&self, path: &PathValue, pattern: &str) -> Result<Vec<PathValue>> {
        let native = Self::native(path);
        if !native.exists() {
            return Err(Error::NotFound(path.to_string()));
        }
        if !native.is_dir() {
            return Err(Error::NotADirectory(path.to_string()));
        }
        let base = glob::Pattern::escape(&native.to_string_lossy());
        let full = format!("{}/{}", base.trim_end_matches('/'), pattern.trim_end_matches('/'));
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let entries = glob::glob_with(&full, options)
            .map_err(|e| Error::InvalidArgument(format!("invalid glob pattern {pattern:?}: {e}")))?;

        let mut matches = BTreeSet::new();
        for entry in entries {
            let found = entry.map_err(|e| Error::from_io(e.into_error(), path.to_string()))?;
            let Ok(rel) = found.strip_prefix(&native) else {
                continue;
            };
            if rel.as_os_str().is_empty() {
                continue;
            }
            matches.insert(path.join(&rel.to_string_lossy()));
        }
        Ok(matches.into_iter().collect())
    }

    fn walk(&self, path: &PathValue) -> Result<Vec<WalkEntry<PathValue>>> {
        let native = Self::native(path);
        let meta = fs::metadata(&native).map_err(|e| io_err(e, &native))?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(path.to_string()));
        }

        let mut groups: BTreeMap<PathBuf, (BTreeSet<String>, BTreeSet<String>)> = BTreeMap::new();
        for entry in WalkDir::new(&native).sort_by_file_name() {
            let entry = entry.map_err(Error::backend)?;
            let rel = entry
                .path()
                .strip_prefix(&native)
                .map(Path::to_path_buf)
                .unwrap_or_default();
            if entry.depth() == 0 {
                groups.entry(rel).or_default();
                continue;
            }
            let parent = rel.parent().map(Path::to_path_buf).unwrap_or_default();
            let name = entry.file_name().to_string_lossy().to_string();
            let group = groups.entry(parent).or_default();
            if entry.file_type().is_dir() {
                group.0.insert(name);
                groups.entry(rel).or_default();
            } else {
                group.1.insert(name);
            }
        }

        Ok(groups
            .into_iter()
            .map(|(rel, (dirnames, filenames))| WalkEntry {
                dirpath: path.join(&rel.to_string_lossy()),
                dirnames: dirnames.into_iter().collect(),
                filenames: filenames.into_iter().collect(),
            })
            .collect())
    }

    fn touch(&self, path: &PathValue, exist_ok: bool) -> Result<()> {
        let native = Self::native(path);
        if native.exists() {
            if !exist_ok {
                return Err(Error::AlreadyExists(path.to_string()));
            }
            return filetime::set_file_mtime(&native, FileTime::now())
                .map_err(|e| io_err(e, &native));
        }
        File::create(&native).map_err(|e| io_err(e, &native))?;
        Ok(())
    }

    fn rename(&self, src: &PathValue, dst: &PathValue) -> Result<()> {
        let (from, to) = (Self::native(src), Self::native(dst));
        debug!("rename {} -> {}", from.display(), to.display());
        fs::rename(&from, &to).map_err(|e| io_err(e, &from))
    }

    fn rmdir(&self, path: &PathValue) -> Result<()> {
        let native = Self::native(path);
        fs::remove_dir(&native).map_err(|e| io_err(e, &native))
    }

    fn rmtree(&self, path: &PathValue, options: &RmtreeOptions) -> Result<()> {
        let native = Self::native(path);
        let display = path.to_string();
        let meta = match fs::symlink_metadata(&native) {
            Ok(meta) => meta,
            Err(err) => return options.handle("lstat", &display, io_err(err, &native)),
        };
        if !meta.is_dir() {
            return options.handle("rmtree", &display, Error::NotADirectory(display.clone()));
        }

        debug!("rmtree {}", native.display());
        for entry in WalkDir::new(&native).contents_first(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    options.handle("scandir", &display, Error::backend(err))?;
                    continue;
                }
            };
            let (op, result) = if entry.file_type().is_dir() {
                ("rmdir", fs::remove_dir(entry.path()))
            } else {
                ("unlink", fs::remove_file(entry.path()))
            };
            if let Err(err) = result {
                let entry_path = entry.path().display().to_string();
                options.handle(op, &entry_path, Error::from_io(err, entry_path.clone()))?;
            }
        }
        Ok(())
    }

    fn copy(&self, src: &PathValue, dst: &PathValue, follow_symlinks: bool) -> Result<()> {
        let (from, to) = (Self::native(src), Self::native(dst));
        if from.is_dir() && (follow_symlinks || !from.is_symlink()) {
            return Err(Error::IsADirectory(src.to_string()));
        }
        debug!("copy {} -> {}", from.display(), to.display());
        Self::copy_entry(&from, &to, follow_symlinks)
    }

    fn copytree(&self, src: &PathValue, dst: &PathValue, follow_symlinks: bool) -> Result<()> {
        let (from, to) = (Self::native(src), Self::native(dst));
        let meta = fs::metadata(&from).map_err(|e| io_err(e, &from))?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(src.to_string()));
        }

        debug!("copytree {} -> {}", from.display(), to.display());
        for entry in WalkDir::new(&from).follow_links(follow_symlinks) {
            let entry = entry.map_err(Error::backend)?;
            let rel = entry.path().strip_prefix(&from).unwrap_or(entry.path());
            let target = to.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|e| io_err(e, &target))?;
            } else {
                Self::copy_entry(entry.path(), &target, follow_symlinks)?;
            }
        }
        Ok(())
    }

    fn get_metadata(&self, path: &PathValue) -> Result<Metadata> {
        let native = Self::native(path);
        fs::symlink_metadata(&native).map_err(|e| io_err(e, &native))?;
        Ok(Metadata::new())
    }

    fn set_metadata(&self, path: &PathValue, _metadata: Metadata) -> Result<()> {
        Err(Error::UnsupportedOperation(format!(
            "local files carry no object metadata: {path}"
        )))
    }

    fn symlink_to(&self, path: &PathValue, target: &str) -> Result<()> {
        let native = Self::native(path);
        if fs::symlink_metadata(&native).is_ok() {
            return Err(Error::AlreadyExists(path.to_string()));
        }
        debug!("symlink {} -> {}", native.display(), target);
        create_symlink(Path::new(target), &native)
    }

    fn readlink(&self, path: &PathValue) -> Result<String> {
        let native = Self::native(path);
        let meta = fs::symlink_metadata(&native).map_err(|e| io_err(e, &native))?;
        if !meta.file_type().is_symlink() {
            return Err(Error::InvalidArgument(format!("{path} is not a symlink")));
        }
        let target = fs::read_link(&native).map_err(|e| io_err(e, &native))?;
        Ok(target.to_string_lossy().to_string())
    }

    fn is_symlink(&self, path: &PathValue) -> Result<bool> {
        Ok(Self::native(path).is_symlink())
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn tag(&self) -> &str {
        LOCAL_TAG
    }

    async fn exists(&self, path: &PathValue) -> Result<bool> {
        let native = Self::native(path);
        existence(tokio::fs::try_exists(&native).await, &native)
    }

    async fn read_bytes(&self, path: &PathValue) -> Result<Bytes> {
        let native = Self::native(path);
        if tokio::fs::metadata(&native).await.is_ok_and(|m| m.is_dir()) {
            return Err(Error::IsADirectory(path.to_string()));
        }
        let data = tokio::fs::read(&native).await.map_err(|e| io_err(e, &native))?;
        Ok(Bytes::from(data))
    }

    async fn write_bytes(&self, path: &PathValue, data: Bytes) -> Result<()> {
        let native = Self::native(path);
        debug!("writing {} bytes to {}", data.len(), native.display());
        tokio::fs::write(&native, &data)
            .await
            .map_err(|e| io_err(e, &native))
    }

    async fn read_stream(&self, path: &PathValue, chunk_size: usize) -> Result<ChunkStream> {
        let native = Self::native(path);
        if tokio::fs::metadata(&native).await.is_ok_and(|m| m.is_dir()) {
            return Err(Error::IsADirectory(path.to_string()));
        }
        let file = tokio::fs::File::open(&native)
            .await
            .map_err(|e| io_err(e, &native))?;
        let chunk_size = self.chunk_size_or_default(chunk_size);

        let chunks = stream::try_unfold(file, move |file| next_chunk(file, chunk_size));
        Ok(chunks.boxed())
    }

    async fn delete(&self, path: &PathValue) -> Result<()> {
        let path = path.clone();
        self.offload(move |b| BlockingBackend::delete(&b, &path)).await
    }

    async fn list_dir(&self, path: &PathValue) -> Result<Vec<PathValue>> {
        let path = path.clone();
        self.offload(move |b| BlockingBackend::list_dir(&b, &path))
            .await
    }

    async fn is_dir(&self, path: &PathValue) -> Result<bool> {
        Ok(tokio::fs::metadata(Self::native(path))
            .await
            .is_ok_and(|m| m.is_dir()))
    }

    async fn is_file(&self, path: &PathValue) -> Result<bool> {
        Ok(tokio::fs::metadata(Self::native(path))
            .await
            .is_ok_and(|m| m.is_file()))
    }

    async fn stat(&self, path: &PathValue) -> Result<Stat> {
        let path = path.clone();
        self.offload(move |b| BlockingBackend::stat(&b, &path)).await
    }

    async fn mkdir(&self, path: &PathValue, parents: bool, exist_ok: bool) -> Result<()> {
        let path = path.clone();
        self.offload(move |b| BlockingBackend::mkdir(&b, &path, parents, exist_ok))
            .await
    }

    async fn glob(&self, path: &PathValue, pattern: &str) -> Result<Vec<PathValue>> {
        let (path, pattern) = (path.clone(), pattern.to_string());
        self.offload(move |b| BlockingBackend::glob(&b, &path, &pattern))
            .await
    }

    async fn walk(&self, path: &PathValue) -> Result<Vec<WalkEntry<PathValue>>> {
        let path = path.clone();
        self.offload(move |b| BlockingBackend::walk(&b, &path)).await
    }

    async fn touch(&self, path: &PathValue, exist_ok: bool) -> Result<()> {
        let path = path.clone();
        self.offload(move |b| BlockingBackend::touch(&b, &path, exist_ok))
            .await
    }

    async fn rename(&self, src: &PathValue, dst: &PathValue) -> Result<()> {
        let (src, dst) = (src.clone(), dst.clone());
        self.offload(move |b| BlockingBackend::rename(&b, &src, &dst))
            .await
    }

    async fn rmdir(&self, path: &PathValue) -> Result<()> {
        let path = path.clone();
        self.offload(move |b| BlockingBackend::rmdir(&b, &path)).await
    }

    async fn rmtree(&self, path: &PathValue, options: &RmtreeOptions) -> Result<()> {
        let (path, options) = (path.clone(), options.clone());
        self.offload(move |b| BlockingBackend::rmtree(&b, &path, &options))
            .await
    }

    async fn copy(&self, src: &PathValue, dst: &PathValue, follow_symlinks: bool) -> Result<()> {
        let (src, dst) = (src.clone(), dst.clone());
        self.offload(move |b| BlockingBackend::copy(&b, &src, &dst, follow_symlinks))
            .await
    }

    async fn copytree(
        &self,
        src: &PathValue,
        dst: &PathValue,
        follow_symlinks: bool,
    ) -> Result<()> {
        let (src, dst) = (src.clone(), dst.clone());
        self.offload(move |b| BlockingBackend::copytree(&b, &src, &dst, follow_symlinks))
            .await
    }

    async fn get_metadata(&self, path: &PathValue) -> Result<Metadata> {
        let path = path.clone();
        self.offload(move |b| BlockingBackend::get_metadata(&b, &path))
            .await
    }

    async fn set_metadata(&self, path: &PathValue, metadata: Metadata) -> Result<()> {
        BlockingBackend::set_metadata(self, path, metadata)
    }

    async fn symlink_to(&self, path: &PathValue, target: &str) -> Result<()> {
        let (path, target) = (path.clone(), target.to_string());
        self.offload(move |b| BlockingBackend::symlink_to(&b, &path, &target))
            .await
    }

    async fn readlink(&self, path: &PathValue) -> Result<String> {
        let path = path.clone();
        self.offload(move |b| BlockingBackend::readlink(&b, &path))
            .await
    }

    async fn is_symlink(&self, path: &PathValue) -> Result<bool> {
        Ok(tokio::fs::symlink_metadata(Self::native(path))
            .await
            .is_ok_and(|m| m.file_type().is_symlink()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, PathValue) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("X");
        fs::create_dir_all(root.join("d")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b.log"), "b").unwrap();
        fs::write(root.join("d").join("c.txt"), "c").unwrap();
        (temp_dir, PathValue::local(&root))
    }

    #[test]
    fn test_walk_matches_object_layout() {
        let (_guard, root) = seeded();
        let backend = LocalBackend::new();
        let walk = BlockingBackend::walk(&backend, &root).unwrap();
        assert_eq!(walk.len(), 2);
        assert_eq!(walk[0].dirpath, root);
        assert_eq!(walk[0].dirnames, vec!["d"]);
        assert_eq!(walk[0].filenames, vec!["a.txt", "b.log"]);
        assert_eq!(walk[1].dirpath, root.join("d"));
        assert_eq!(walk[1].filenames, vec!["c.txt"]);
    }

    #[test]
    fn test_glob() {
        let (_guard, root) = seeded();
        let backend = LocalBackend::new();
        let names = |pattern: &str| -> Vec<String> {
            BlockingBackend::glob(&backend, &root, pattern)
                .unwrap()
                .iter()
                .map(|p| p.name().to_string())
                .collect()
        };
        assert_eq!(names("*.txt"), vec!["a.txt"]);
        assert_eq!(names("**/*.txt"), vec!["a.txt", "c.txt"]);

        assert!(matches!(
            BlockingBackend::glob(&backend, &root.join("a.txt"), "*").unwrap_err(),
            Error::NotADirectory(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exists_reports_errors() {
        let (guard, root) = seeded();
        let backend = LocalBackend::new();
        assert!(!Backend::exists(&backend, &root.join("missing")).await.unwrap());
        assert!(!Backend::exists(&backend, &root.join("a.txt/child")).await.unwrap());

        let (first, second) = (guard.path().join("loop1"), guard.path().join("loop2"));
        std::os::unix::fs::symlink(&second, &first).unwrap();
        std::os::unix::fs::symlink(&first, &second).unwrap();
        let looped = PathValue::local(&first);
        assert!(matches!(
            Backend::exists(&backend, &looped).await.unwrap_err(),
            Error::Io(_)
        ));
        assert!(BlockingBackend::exists(&backend, &looped).is_err());
    }

    #[test]
    fn test_error_kinds() {
        let (guard, root) = seeded();
        let backend = LocalBackend::new();
        let missing = PathValue::local(guard.path().join("missing"));

        assert!(matches!(
            BlockingBackend::read_bytes(&backend, &missing).unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            BlockingBackend::delete(&backend, &root).unwrap_err(),
            Error::IsADirectory(_)
        ));
        assert!(matches!(
            BlockingBackend::rmdir(&backend, &root).unwrap_err(),
            Error::DirectoryNotEmpty(_)
        ));
        assert!(matches!(
            BlockingBackend::mkdir(&backend, &root, false, false).unwrap_err(),
            Error::AlreadyExists(_)
        ));
        BlockingBackend::mkdir(&backend, &root, true, true).unwrap();
    }

    #[test]
    fn test_rmtree_and_copytree() {
        let (guard, root) = seeded();
        let backend = LocalBackend::new();
        let copy = PathValue::local(guard.path().join("Y"));
        BlockingBackend::copytree(&backend, &root, &copy, true).unwrap();
        assert_eq!(
            BlockingBackend::read_text(&backend, &copy.join("d/c.txt")).unwrap(),
            "c"
        );

        BlockingBackend::rmtree(&backend, &copy, &RmtreeOptions::default()).unwrap();
        assert!(!guard.path().join("Y").exists());
        assert!(BlockingBackend::rmtree(&backend, &copy, &RmtreeOptions::default()).is_err());
        BlockingBackend::rmtree(&backend, &copy, &RmtreeOptions::ignore_errors()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks() {
        let (guard, root) = seeded();
        let backend = LocalBackend::new();
        let link = PathValue::local(guard.path().join("link"));
        let target = root.join("a.txt").to_string();
        BlockingBackend::symlink_to(&backend, &link, &target).unwrap();
        assert!(BlockingBackend::is_symlink(&backend, &link).unwrap());
        assert_eq!(BlockingBackend::readlink(&backend, &link).unwrap(), target);
        assert_eq!(BlockingBackend::read_text(&backend, &link).unwrap(), "a");

        let copied = PathValue::local(guard.path().join("link2"));
        BlockingBackend::copy(&backend, &link, &copied, false).unwrap();
        assert!(BlockingBackend::is_symlink(&backend, &copied).unwrap());
    }

    #[tokio::test]
    async fn test_async_stream_and_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = PathValue::local(temp_dir.path().join("digits"));
        let backend = LocalBackend::new();
        Backend::write_text(&backend, &path, "0123456789").await.unwrap();

        let chunks: Vec<Bytes> = Backend::read_stream(&backend, &path, 4)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(Backend::exists(&backend, &path).await.unwrap());
        assert_eq!(Backend::stat(&backend, &path).await.unwrap().size, 10);
    }

    #[test]
    fn test_touch() {
        let temp_dir = TempDir::new().unwrap();
        let path = PathValue::local(temp_dir.path().join("t"));
        let backend = LocalBackend::new();
        BlockingBackend::touch(&backend, &path, false).unwrap();
        assert!(BlockingBackend::touch(&backend, &path, false).is_err());
        BlockingBackend::touch(&backend, &path, true).unwrap();
        assert_eq!(BlockingBackend::stat(&backend, &path).unwrap().size, 0);
    }
}
