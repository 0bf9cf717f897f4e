use super::{as_uri, cloud_prefix, link_target_value, stored_link_target, MAX_SYMLINK_HOPS};
use crate::backend::{BlockingBackend, Metadata, RmtreeOptions, Stat, WalkEntry};
use crate::class::BlockingClass;
use crate::emulation::recursive_pattern;
use crate::handle::{BlockingFileHandle, OpenMode};
use crate::path::AsyncPath;
use crate::registry::Registry;
use crate::router::{self, AnyPath, PathInput};
use crate::transfer;
use crate::value::PathValue;
use crate::{Error, Result};
use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Div;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// A path whose I/O runs synchronously on the caller's thread
#[derive(Clone)]
pub struct BlockingPath {
    value: PathValue,
    class: Arc<BlockingClass>,
    client: Option<Arc<dyn BlockingBackend>>,
}

impl BlockingPath {
    /// Parse `src` and dispatch it through the global registry
    pub fn new(src: impl Into<PathInput>) -> Result<Self> {
        router::blocking_path(src)
    }

    pub(crate) fn from_parts(value: PathValue, class: Arc<BlockingClass>) -> Self {
        Self {
            value,
            class,
            client: None,
        }
    }

    /// Same path, served by `client` instead of the class default
    pub fn with_client(mut self, client: Arc<dyn BlockingBackend>) -> Self {
        self.client = Some(client);
        self
    }

    /// The injected client, if any
    pub fn client(&self) -> Option<&Arc<dyn BlockingBackend>> {
        self.client.as_ref()
    }

    /// Client serving this path
    pub fn backend(&self) -> Result<Arc<dyn BlockingBackend>> {
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

    /// Derived path: same class and client unless the scheme changed
    fn derive(&self, value: PathValue) -> Self {
        if value.scheme() != self.value.scheme() {
            if let Ok(classes) = router::classes_for(Registry::global(), &value) {
                return Self::from_parts(value, classes.blocking);
            }
        }
        Self {
            value,
            class: self.class.clone(),
            client: self.client.clone(),
        }
    }

    /// Coerce a transfer target; plain values of the same scheme inherit the
    /// receiver's class and client
    fn target(&self, target: impl Into<PathInput>) -> Result<Self> {
        let value = match target.into() {
            PathInput::Blocking(path) => return Ok(path),
            PathInput::Suspend(path) => path.value().clone(),
            PathInput::Value(value) => value,
            PathInput::Text(text) => PathValue::parse(&text)?,
        };
        if value.scheme() == self.value.scheme() {
            Ok(self.derive(value))
        } else {
            router::blocking_path(value)
        }
    }

    // Structure

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

    /// Object key (segments joined by `/`)
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

    /// `self` relative to `base`, as a `/`-joined string
    pub fn relative_to(&self, base: &BlockingPath) -> Result<String> {
        Ok(self.value.relative_to(&base.value)?.join("/"))
    }

    pub fn is_relative_to(&self, base: &BlockingPath) -> bool {
        self.value.is_relative_to(&base.value)
    }

    /// Shell-style match against the trailing segments
    pub fn match_pattern(&self, pattern: &str) -> bool {
        self.value.matches(pattern)
    }

    /// Anchor relative local paths at the working directory
    pub fn absolute(&self) -> Result<Self> {
        if self.value.is_absolute() {
            return Ok(self.clone());
        }
        let cwd = std::env::current_dir()?;
        Ok(self.derive(PathValue::local(cwd.join(self.value.to_path_buf()))))
    }

    /// Absolute path with symlinks followed
    pub fn resolve(&self) -> Result<Self> {
        if self.value.is_local() {
            let absolute = self.absolute()?;
            return match std::fs::canonicalize(absolute.value.to_path_buf()) {
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
            if !backend.is_symlink(&current)? {
                return Ok(self.derive(current));
            }
            let raw = backend.readlink(&current)?;
            current = link_target_value(&current, &raw)?;
        }
        Err(Error::InvalidArgument(format!(
            "too many levels of symbolic links resolving {self}"
        )))
    }

    /// Whether both paths resolve to the same location
    pub fn samefile(&self, other: &BlockingPath) -> Result<bool> {
        Ok(self.resolve()?.value == other.resolve()?.value)
    }

    // I/O

    pub fn exists(&self) -> Result<bool> {
        self.backend()?.exists(&self.value)
    }

    pub fn is_dir(&self) -> Result<bool> {
        self.backend()?.is_dir(&self.value)
    }

    pub fn is_file(&self) -> Result<bool> {
        self.backend()?.is_file(&self.value)
    }

    pub fn is_symlink(&self) -> Result<bool> {
        self.backend()?.is_symlink(&self.value)
    }

    pub fn stat(&self) -> Result<Stat> {
        self.backend()?.stat(&self.value)
    }

    pub fn read_bytes(&self) -> Result<Bytes> {
        self.backend()?.read_bytes(&self.value)
    }

    pub fn read_text(&self) -> Result<String> {
        self.backend()?.read_text(&self.value)
    }

    pub fn write_bytes(&self, data: impl AsRef<[u8]>) -> Result<()> {
        self.backend()?
            .write_bytes(&self.value, Bytes::copy_from_slice(data.as_ref()))
    }

    pub fn write_text(&self, data: &str) -> Result<()> {
        self.backend()?.write_text(&self.value, data)
    }

    /// Open a streaming handle; `mode` is `r`, `rb`, `w`, `wb`, `a` or `ab`
    pub fn open(&self, mode: &str) -> Result<BlockingFileHandle> {
        let mode: OpenMode = mode.parse()?;
        BlockingFileHandle::open(self.backend()?, self.value.clone(), mode, 0)
    }

    /// Run `f` with an open handle, closing it on every exit path
    pub fn with_open<T, F>(&self, mode: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut BlockingFileHandle) -> Result<T>,
    {
        let mut handle = self.open(mode)?;
        let outcome = f(&mut handle);
        let closed = handle.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    pub fn readlines(&self) -> Result<Vec<String>> {
        self.with_open("r", |handle| handle.readlines())
    }

    pub fn writelines<I, S>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_open("w", |handle| handle.writelines(lines))
    }

    /// Direct children
    pub fn iterdir(&self) -> Result<Vec<Self>> {
        Ok(self
            .backend()?
            .list_dir(&self.value)?
            .into_iter()
            .map(|value| self.derive(value))
            .collect())
    }

    pub fn glob(&self, pattern: &str) -> Result<Vec<Self>> {
        Ok(self
            .backend()?
            .glob(&self.value, pattern)?
            .into_iter()
            .map(|value| self.derive(value))
            .collect())
    }

    /// [`BlockingPath::glob`] at every depth
    pub fn rglob(&self, pattern: &str) -> Result<Vec<Self>> {
        self.glob(&recursive_pattern(pattern))
    }

    pub fn walk(&self) -> Result<Vec<WalkEntry<Self>>> {
        Ok(self
            .backend()?
            .walk(&self.value)?
            .into_iter()
            .map(|entry| entry.map(|value| self.derive(value)))
            .collect())
    }

    pub fn mkdir(&self, parents: bool, exist_ok: bool) -> Result<()> {
        self.backend()?.mkdir(&self.value, parents, exist_ok)
    }

    pub fn touch(&self, exist_ok: bool) -> Result<()> {
        self.backend()?.touch(&self.value, exist_ok)
    }

    /// Remove a file or symlink
    pub fn unlink(&self, missing_ok: bool) -> Result<()> {
        match self.backend()?.delete(&self.value) {
            Err(err) if missing_ok && err.is_not_found() => Ok(()),
            other => other,
        }
    }

    pub fn rmdir(&self) -> Result<()> {
        self.backend()?.rmdir(&self.value)
    }

    pub fn rmtree(&self) -> Result<()> {
        self.rmtree_with(&RmtreeOptions::default())
    }

    pub fn rmtree_with(&self, options: &RmtreeOptions) -> Result<()> {
        self.backend()?.rmtree(&self.value, options)
    }

    /// Move to `target` (any backend), returning the new path
    pub fn rename(&self, target: impl Into<PathInput>) -> Result<Self> {
        let target = self.target(target)?;
        debug!("rename {} -> {}", self, target);
        transfer::rename(self, &target)?;
        Ok(target)
    }

    /// [`BlockingPath::rename`], overwriting an existing target
    pub fn replace(&self, target: impl Into<PathInput>) -> Result<Self> {
        self.rename(target)
    }

    /// Copy this file to `target`; a directory target receives it by name
    pub fn copy(&self, target: impl Into<PathInput>, follow_symlinks: bool) -> Result<Self> {
        let mut target = self.target(target)?;
        if target.is_dir()? {
            target = target.join(self.name());
        }
        transfer::copy(self, &target, follow_symlinks)?;
        Ok(target)
    }

    pub fn copytree(&self, target: impl Into<PathInput>, follow_symlinks: bool) -> Result<Self> {
        let target = self.target(target)?;
        transfer::copytree(self, &target, follow_symlinks)?;
        Ok(target)
    }

    pub fn get_metadata(&self) -> Result<Metadata> {
        self.backend()?.get_metadata(&self.value)
    }

    pub fn set_metadata(&self, metadata: Metadata) -> Result<()> {
        self.backend()?.set_metadata(&self.value, metadata)
    }

    /// Make this path a symlink to `target`
    pub fn symlink_to(&self, target: &str) -> Result<()> {
        let stored = stored_link_target(&self.value, target)?;
        self.backend()?.symlink_to(&self.value, &stored)
    }

    /// Where this symlink points
    pub fn readlink(&self) -> Result<Self> {
        let raw = self.backend()?.readlink(&self.value)?;
        let value = if self.value.is_local() {
            PathValue::parse(&raw)?
        } else {
            link_target_value(&self.value, &raw)?
        };
        Ok(self.derive(value))
    }

    // Modes

    /// Suspend-mode twin through the global registry
    pub fn to_async(&self) -> Result<AsyncPath> {
        router::async_path(self.value.clone())
    }

    /// Already blocking
    pub fn to_blocking(&self) -> Self {
        self.clone()
    }

    /// Equality against a path of either mode
    pub fn try_eq(&self, other: &AnyPath) -> Result<bool> {
        AnyPath::Blocking(self.clone()).try_eq(other)
    }
}

impl fmt::Debug for BlockingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.class.name(), self.value.to_string())
    }
}

impl fmt::Display for BlockingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl PartialEq for BlockingPath {
    fn eq(&self, other: &Self) -> bool {
        self.class.name() == other.class.name() && self.value == other.value
    }
}

impl Eq for BlockingPath {}

impl Hash for BlockingPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class.name().hash(state);
        self.value.hash(state);
    }
}

impl PartialOrd for BlockingPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlockingPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.class.name().cmp(other.class.name()))
    }
}

impl Div<&str> for &BlockingPath {
    type Output = BlockingPath;

    fn div(self, rhs: &str) -> BlockingPath {
        self.join(rhs)
    }
}

impl Div<&str> for BlockingPath {
    type Output = BlockingPath;

    fn div(self, rhs: &str) -> BlockingPath {
        self.join(rhs)
    }
}
