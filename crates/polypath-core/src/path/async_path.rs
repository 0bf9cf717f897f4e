use super::{as_uri, cloud_prefix, link_target_value, stored_link_target, MAX_SYMLINK_HOPS};
use crate::backend::{Backend, Metadata, RmtreeOptions, Stat, WalkEntry};
use crate::class::AsyncClass;
use crate::emulation::recursive_pattern;
use crate::handle::{FileHandle, OpenMode};
use crate::path::BlockingPath;
use crate::registry::Registry;
use crate::router::{self, AnyPath, PathInput};
use crate::transfer;
use crate::value::PathValue;
use crate::{Error, Result};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Div;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// A path whose I/O suspends at every backend call
#[derive(Clone)]
pub struct AsyncPath {
    value: PathValue,
    class: Arc<AsyncClass>,
    client: Option<Arc<dyn Backend>>,
}

impl AsyncPath {
    /// Parse `src` and dispatch it through the global registry
    pub fn new(src: impl Into<PathInput>) -> Result<Self> {
        router::async_path(src)
    }

    pub(crate) fn from_parts(value: PathValue, class: Arc<AsyncClass>) -> Self {
        Self {
            value,
            class,
            client: None,
        }
    }

    /// Same path, served by `client` instead of the class default
    pub fn with_client(mut self, client: Arc<dyn Backend>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn client(&self) -> Option<&Arc<dyn Backend>> {
        self.client.as_ref()
    }

    /// Client serving this path
    pub fn backend(&self) -> Result<Arc<dyn Backend>> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => self.class.default_client(),
        }
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn value(&self) -> &PathValue {
        &self.value
    }

    fn derive(&self, value: PathValue) -> Self {
        if value.scheme() != self.value.scheme() {
            if let Ok(classes) = router::classes_for(Registry::global(), &value) {
                return Self::from_parts(value, classes.suspend);
            }
        }
        Self {
            value,
            class: self.class.clone(),
            client: self.client.clone(),
        }
    }

    fn target(&self, target: impl Into<PathInput>) -> Result<Self> {
        let value = match target.into() {
            PathInput::Suspend(path) => return Ok(path),
            PathInput::Blocking(path) => path.value().clone(),
            PathInput::Value(value) => value,
            PathInput::Text(text) => PathValue::parse(&text)?,
        };
        if value.scheme() == self.value.scheme() {
            Ok(self.derive(value))
        } else {
            router::async_path(value)
        }
    }

    pub fn parent(&self) -> Self {
        self.derive(self.value.parent())
    }

    /// Ancestors, nearest first
    pub fn parents(&self) -> Vec<Self> {
        self.value
            .ancestors()
            .into_iter()
            .map(|value| self.derive(value))
            .collect()
    }

    pub fn join(&self, other: &str) -> Self {
        self.derive(self.value.join(other))
    }

    pub fn with_name(&self, name: &str) -> Result<Self> {
        Ok(self.derive(self.value.with_name(name)?))
    }

    pub fn with_suffix(&self, suffix: &str) -> Result<Self> {
        Ok(self.derive(self.value.with_suffix(suffix)?))
    }

    pub fn with_stem(&self, stem: &str) -> Result<Self> {
        Ok(self.derive(self.value.with_stem(stem)?))
    }

    pub fn name(&self) -> &str {
        self.value.name()
    }

    pub fn suffix(&self) -> &str {
        self.value.suffix()
    }

    pub fn suffixes(&self) -> Vec<String> {
        self.value.suffixes()
    }

    pub fn stem(&self) -> &str {
        self.value.stem()
    }

    pub fn parts(&self) -> Vec<String> {
        self.value.parts()
    }

    pub fn anchor(&self) -> String {
        self.value.anchor()
    }

    pub fn scheme(&self) -> Option<&str> {
        self.value.scheme()
    }

    pub fn bucket(&self) -> &str {
        self.value.bucket()
    }

    pub fn key(&self) -> String {
        self.value.key()
    }

    pub fn is_absolute(&self) -> bool {
        self.value.is_absolute()
    }

    pub fn as_uri(&self) -> Result<String> {
        as_uri(&self.value)
    }

    pub fn cloud_prefix(&self) -> String {
        cloud_prefix(&self.value)
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.value.to_path_buf()
    }

    pub fn relative_to(&self, base: &AsyncPath) -> Result<String> {
        Ok(self.value.relative_to(&base.value)?.join("/"))
    }

    pub fn is_relative_to(&self, base: &AsyncPath) -> bool {
        self.value.is_relative_to(&base.value)
    }

    pub fn match_pattern(&self, pattern: &str) -> bool {
        self.value.matches(pattern)
    }

    pub fn absolute(&self) -> Result<Self> {
        if self.value.is_absolute() {
            return Ok(self.clone());
        }
        let cwd = std::env::current_dir()?;
        Ok(self.derive(PathValue::local(cwd.join(self.value.to_path_buf()))))
    }

    /// Absolute path with symlinks followed
    pub async fn resolve(&self) -> Result<Self> {
        if self.value.is_local() {
            let absolute = self.absolute()?;
            return match tokio::fs::canonicalize(absolute.value.to_path_buf()).await {
                Ok(resolved) => Ok(self.derive(PathValue::local(resolved))),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    Ok(self.derive(absolute.value.normalized()))
                }
                Err(err) => Err(Error::from_io(err, self.value.to_string())),
            };
        }

        let backend = self.backend()?;
        let mut current = self.value.normalized();
        for _ in 0..MAX_SYMLINK_HOPS {
            if !backend.is_symlink(&current).await? {
                return Ok(self.derive(current));
            }
            let raw = backend.readlink(&current).await?;
            current = link_target_value(&current, &raw)?;
        }
        Err(Error::InvalidArgument(format!(
            "too many levels of symbolic links resolving {self}"
        )))
    }

    pub async fn samefile(&self, other: &AsyncPath) -> Result<bool> {
        Ok(self.resolve().await?.value == other.resolve().await?.value)
    }

    pub async fn exists(&self) -> Result<bool> {
        self.backend()?.exists(&self.value).await
    }

    pub async fn is_dir(&self) -> Result<bool> {
        self.backend()?.is_dir(&self.value).await
    }

    pub async fn is_file(&self) -> Result<bool> {
        self.backend()?.is_file(&self.value).await
    }

    pub async fn is_symlink(&self) -> Result<bool> {
        self.backend()?.is_symlink(&self.value).await
    }

    pub async fn stat(&self) -> Result<Stat> {
        self.backend()?.stat(&self.value).await
    }

    pub async fn read_bytes(&self) -> Result<Bytes> {
        self.backend()?.read_bytes(&self.value).await
    }

    pub async fn read_text(&self) -> Result<String> {
        self.backend()?.read_text(&self.value).await
    }

    pub async fn write_bytes(&self, data: impl AsRef<[u8]>) -> Result<()> {
        let data = Bytes::copy_from_slice(data.as_ref());
        self.backend()?.write_bytes(&self.value, data).await
    }

    pub async fn write_text(&self, data: &str) -> Result<()> {
        self.backend()?.write_text(&self.value, data).await
    }

    /// Open a streaming handle; `mode` is `r`, `rb`, `w`, `wb`, `a` or `ab`
    pub async fn open(&self, mode: &str) -> Result<FileHandle> {
        let mode: OpenMode = mode.parse()?;
        FileHandle::open(self.backend()?, self.value.clone(), mode, 0).await
    }

    /// Run `f` with an open handle, closing it on every exit path
    ///
    /// ```no_run
    /// # async fn demo(path: polypath_core::AsyncPath) -> polypath_core::Result<()> {
    /// path.with_open("w", |handle| {
    ///     Box::pin(async move {
    ///         handle.write_str("hello")?;
    ///         Ok(())
    ///     })
    /// })
    /// .await
    /// # }
    /// ```
    pub async fn with_open<T, F>(&self, mode: &str, f: F) -> Result<T>
    where
        F: for<'h> FnOnce(&'h mut FileHandle) -> BoxFuture<'h, Result<T>>,
    {
        let mut handle = self.open(mode).await?;
        let outcome = f(&mut handle).await;
        let closed = handle.close().await;
        let value = outcome?;
        closed?;
        Ok(value)
    }

    pub async fn readlines(&self) -> Result<Vec<String>> {
        let mut handle = self.open("r").await?;
        let outcome = handle.readlines().await;
        let closed = handle.close().await;
        let lines = outcome?;
        closed?;
        Ok(lines)
    }

    pub async fn writelines<I, S>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut handle = self.open("w").await?;
        let outcome = handle.writelines(lines);
        let closed = handle.close().await;
        outcome?;
        closed
    }

    pub async fn iterdir(&self) -> Result<Vec<Self>> {
        Ok(self
            .backend()?
            .list_dir(&self.value)
            .await?
            .into_iter()
            .map(|value| self.derive(value))
            .collect())
    }

    pub async fn glob(&self, pattern: &str) -> Result<Vec<Self>> {
        Ok(self
            .backend()?
            .glob(&self.value, pattern)
            .await?
            .into_iter()
            .map(|value| self.derive(value))
            .collect())
    }

    pub async fn rglob(&self, pattern: &str) -> Result<Vec<Self>> {
        self.glob(&recursive_pattern(pattern)).await
    }

    pub async fn walk(&self) -> Result<Vec<WalkEntry<Self>>> {
        Ok(self
            .backend()?
            .walk(&self.value)
            .await?
            .into_iter()
            .map(|entry| entry.map(|value| self.derive(value)))
            .collect())
    }

    pub async fn mkdir(&self, parents: bool, exist_ok: bool) -> Result<()> {
        self.backend()?.mkdir(&self.value, parents, exist_ok).await
    }

    pub async fn touch(&self, exist_ok: bool) -> Result<()> {
        self.backend()?.touch(&self.value, exist_ok).await
    }

    pub async fn unlink(&self, missing_ok: bool) -> Result<()> {
        match self.backend()?.delete(&self.value).await {
            Err(err) if missing_ok && err.is_not_found() => Ok(()),
            other => other,
        }
    }

    pub async fn rmdir(&self) -> Result<()> {
        self.backend()?.rmdir(&self.value).await
    }

    pub async fn rmtree(&self) -> Result<()> {
        self.rmtree_with(&RmtreeOptions::default()).await
    }

    pub async fn rmtree_with(&self, options: &RmtreeOptions) -> Result<()> {
        self.backend()?.rmtree(&self.value, options).await
    }

    pub async fn rename(&self, target: impl Into<PathInput>) -> Result<Self> {
        let target = self.target(target)?;
        debug!("rename {} -> {}", self, target);
        transfer::rename_async(self, &target).await?;
        Ok(target)
    }

    pub async fn replace(&self, target: impl Into<PathInput>) -> Result<Self> {
        self.rename(target).await
    }

    /// Copy this file to `target`; a directory target receives it by name
    pub async fn copy(&self, target: impl Into<PathInput>, follow_symlinks: bool) -> Result<Self> {
        let mut target = self.target(target)?;
        if target.is_dir().await? {
            target = target.join(self.name());
        }
        transfer::copy_async(self, &target, follow_symlinks).await?;
        Ok(target)
    }

    pub async fn copytree(
        &self,
        target: impl Into<PathInput>,
        follow_symlinks: bool,
    ) -> Result<Self> {
        let target = self.target(target)?;
        transfer::copytree_async(self, &target, follow_symlinks).await?;
        Ok(target)
    }

    pub async fn get_metadata(&self) -> Result<Metadata> {
        self.backend()?.get_metadata(&self.value).await
    }

    pub async fn set_metadata(&self, metadata: Metadata) -> Result<()> {
        self.backend()?.set_metadata(&self.value, metadata).await
    }

    pub async fn symlink_to(&self, target: &str) -> Result<()> {
        let stored = stored_link_target(&self.value, target)?;
        self.backend()?.symlink_to(&self.value, &stored).await
    }

    pub async fn readlink(&self) -> Result<Self> {
        let raw = self.backend()?.readlink(&self.value).await?;
        let value = if self.value.is_local() {
            PathValue::parse(&raw)?
        } else {
            link_target_value(&self.value, &raw)?
        };
        Ok(self.derive(value))
    }

    /// Already suspend-mode
    pub fn to_async(&self) -> Self {
        self.clone()
    }

    /// Blocking twin through the global registry
    pub fn to_blocking(&self) -> Result<BlockingPath> {
        router::blocking_path(self.value.clone())
    }

    pub fn try_eq(&self, other: &AnyPath) -> Result<bool> {
        AnyPath::Suspend(self.clone()).try_eq(other)
    }
}

impl fmt::Debug for AsyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.class.name(), self.value.to_string())
    }
}

impl fmt::Display for AsyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl PartialEq for AsyncPath {
    fn eq(&self, other: &Self) -> bool {
        self.class.name() == other.class.name() && self.value == other.value
    }
}

impl Eq for AsyncPath {}

impl Hash for AsyncPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class.name().hash(state);
        self.value.hash(state);
    }
}

impl PartialOrd for AsyncPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AsyncPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.class.name().cmp(other.class.name()))
    }
}

impl Div<&str> for &AsyncPath {
    type Output = AsyncPath;

    fn div(self, rhs: &str) -> AsyncPath {
        self.join(rhs)
    }
}

impl Div<&str> for AsyncPath {
    type Output = AsyncPath;

    fn div(self, rhs: &str) -> AsyncPath {
        self.join(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;
    use crate::object::ObjectBackend;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn isolated(uri: &str) -> AsyncPath {
        let backend: Arc<dyn Backend> =
            Arc::new(ObjectBackend::new("memory", Arc::new(MemoryClient::new())));
        AsyncPath::new(uri).unwrap().with_client(backend)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let path = isolated("memory://bucket/dir/file.txt");
        path.write_text("hello").await.unwrap();
        assert_eq!(path.read_text().await.unwrap(), "hello");
        path.write_bytes(b"\x00\x01").await.unwrap();
        assert_eq!(path.read_bytes().await.unwrap().as_ref(), b"\x00\x01");
        assert!(path.parent().is_dir().await.unwrap());
    }

    #[tokio::test]
    async fn test_handles_through_paths() {
        let path = isolated("memory://bucket/seek.txt");
        path.write_text("0123456789").await.unwrap();

        let mut handle = path.open("r").await.unwrap();
        assert_eq!(handle.read_text(Some(3)).await.unwrap(), "012");
        assert_eq!(handle.seek(5, crate::handle::Whence::Start).await.unwrap(), 5);
        assert_eq!(handle.read_text(None).await.unwrap(), "56789");
        handle.close().await.unwrap();

        let written = path
            .with_open("a", |handle| {
                Box::pin(async move { handle.write_str("!") })
            })
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(path.read_text().await.unwrap(), "0123456789!");
    }

    #[tokio::test]
    async fn test_glob_and_walk() {
        let root = isolated("memory://bucket/X");
        for name in ["a.txt", "b.log", "d/c.txt"] {
            root.join(name).write_text(name).await.unwrap();
        }

        let names: HashSet<String> = root
            .glob("*.txt")
            .await
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, HashSet::from(["a.txt".to_string()]));

        let names: HashSet<String> = root
            .rglob("*.txt")
            .await
            .unwrap()
            .iter()
            .map(|p| p.key())
            .collect();
        assert_eq!(
            names,
            HashSet::from(["X/a.txt".to_string(), "X/d/c.txt".to_string()])
        );

        let walk = root.walk().await.unwrap();
        assert_eq!(walk.len(), 2);
        assert_eq!(walk[0].dirpath, root);
        assert_eq!(walk[0].dirnames, vec!["d"]);
        assert_eq!(walk[0].filenames, vec!["a.txt", "b.log"]);
        assert_eq!(walk[1].dirpath, root.join("d"));
        assert!(walk[1].dirpath.client().is_some());
    }

    #[tokio::test]
    async fn test_directory_lifecycle() {
        let root = isolated("memory://bucket/tree");
        root.mkdir(false, false).await.unwrap();
        root.mkdir(false, true).await.unwrap();
        assert!(matches!(
            root.mkdir(false, false).await.unwrap_err(),
            Error::AlreadyExists(_)
        ));
        root.join("nested/file").touch(true).await.unwrap();
        assert!(matches!(
            root.rmdir().await.unwrap_err(),
            Error::DirectoryNotEmpty(_)
        ));
        root.rmtree().await.unwrap();
        assert!(!root.exists().await.unwrap());
        assert!(root.iterdir().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_local_resolve_and_copy() {
        let dir = TempDir::new().unwrap();
        let root = AsyncPath::new(dir.path()).unwrap();
        let file = root.join("f.txt");
        file.write_text("data").await.unwrap();

        let dotted = root.join("sub/../f.txt");
        assert_eq!(dotted.resolve().await.unwrap().name(), "f.txt");

        root.join("sub").mkdir(false, false).await.unwrap();
        let copied = file.copy(root.join("sub"), true).await.unwrap();
        assert_eq!(copied, root.join("sub/f.txt"));
        assert_eq!(copied.read_text().await.unwrap(), "data");
    }

    #[tokio::test]
    async fn test_metadata_round_trip() {
        let path = isolated("memory://bucket/meta.bin");
        path.touch(false).await.unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("owner".into(), "ops".into());
        path.set_metadata(metadata.clone()).await.unwrap();
        assert_eq!(path.get_metadata().await.unwrap(), metadata);
    }
}
