//! Path construction and dispatch
//!
//! [`path`] is the single entry point: it parses the input, looks the scheme
//! up in the registry and returns the concrete class for the requested mode.
//! Scheme-less inputs and `file://` URIs go to the local classes.

use crate::class::{local_classes, ClassPair};
use crate::path::{AsyncPath, BlockingPath};
use crate::registry::Registry;
use crate::value::PathValue;
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Execution flavour of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Blocking,
    Suspend,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self> {
        match mode.to_ascii_lowercase().as_str() {
            "sync" | "blocking" => Ok(Mode::Blocking),
            "async" | "suspend" => Ok(Mode::Suspend),
            _ => Err(Error::InvalidMode(mode.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Blocking => "sync",
            Mode::Suspend => "async",
        })
    }
}

/// Anything the factory accepts
#[derive(Debug, Clone)]
pub enum PathInput {
    Value(PathValue),
    Blocking(BlockingPath),
    Suspend(AsyncPath),
    /// Unparsed string; parsing errors surface from the factory
    Text(String),
}

impl From<&str> for PathInput {
    fn from(value: &str) -> Self {
        PathInput::Text(value.to_string())
    }
}

impl From<String> for PathInput {
    fn from(value: String) -> Self {
        PathInput::Text(value)
    }
}

impl From<&String> for PathInput {
    fn from(value: &String) -> Self {
        PathInput::Text(value.clone())
    }
}

impl From<&Path> for PathInput {
    fn from(value: &Path) -> Self {
        PathInput::Value(PathValue::local(value))
    }
}

impl From<PathBuf> for PathInput {
    fn from(value: PathBuf) -> Self {
        PathInput::Value(PathValue::local(value))
    }
}

impl From<&PathBuf> for PathInput {
    fn from(value: &PathBuf) -> Self {
        PathInput::Value(PathValue::local(value))
    }
}

impl From<PathValue> for PathInput {
    fn from(value: PathValue) -> Self {
        PathInput::Value(value)
    }
}

impl From<BlockingPath> for PathInput {
    fn from(value: BlockingPath) -> Self {
        PathInput::Blocking(value)
    }
}

impl From<&BlockingPath> for PathInput {
    fn from(value: &BlockingPath) -> Self {
        PathInput::Blocking(value.clone())
    }
}

impl From<AsyncPath> for PathInput {
    fn from(value: AsyncPath) -> Self {
        PathInput::Suspend(value)
    }
}

impl From<&AsyncPath> for PathInput {
    fn from(value: &AsyncPath) -> Self {
        PathInput::Suspend(value.clone())
    }
}

/// A path of either mode, as returned by the mode-string factory
#[derive(Debug, Clone)]
pub enum AnyPath {
    Blocking(BlockingPath),
    Suspend(AsyncPath),
}

impl AnyPath {
    pub fn mode(&self) -> Mode {
        match self {
            AnyPath::Blocking(_) => Mode::Blocking,
            AnyPath::Suspend(_) => Mode::Suspend,
        }
    }

    pub fn class_name(&self) -> &str {
        match self {
            AnyPath::Blocking(p) => p.class_name(),
            AnyPath::Suspend(p) => p.class_name(),
        }
    }

    pub fn value(&self) -> &PathValue {
        match self {
            AnyPath::Blocking(p) => p.value(),
            AnyPath::Suspend(p) => p.value(),
        }
    }

    pub fn into_blocking(self) -> Option<BlockingPath> {
        match self {
            AnyPath::Blocking(p) => Some(p),
            AnyPath::Suspend(_) => None,
        }
    }

    pub fn into_async(self) -> Option<AsyncPath> {
        match self {
            AnyPath::Suspend(p) => Some(p),
            AnyPath::Blocking(_) => None,
        }
    }

    /// Equality within one mode; comparing across modes is an error
    pub fn try_eq(&self, other: &AnyPath) -> Result<bool> {
        match (self, other) {
            (AnyPath::Blocking(a), AnyPath::Blocking(b)) => Ok(a == b),
            (AnyPath::Suspend(a), AnyPath::Suspend(b)) => Ok(a == b),
            _ => Err(Error::CrossModeComparison {
                left: self.class_name().to_string(),
                right: other.class_name().to_string(),
            }),
        }
    }
}

impl fmt::Display for AnyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

impl From<BlockingPath> for AnyPath {
    fn from(value: BlockingPath) -> Self {
        AnyPath::Blocking(value)
    }
}

impl From<AsyncPath> for AnyPath {
    fn from(value: AsyncPath) -> Self {
        AnyPath::Suspend(value)
    }
}

/// Classes serving `value`
pub fn classes_for(registry: &Registry, value: &PathValue) -> Result<ClassPair> {
    match value.scheme() {
        None => Ok(local_classes().clone()),
        Some(scheme) => registry
            .get(scheme)
            .ok_or_else(|| Error::UnsupportedScheme(scheme.to_string())),
    }
}

/// Build a path of `mode` from `src` using `registry`
pub fn resolve(registry: &Registry, src: impl Into<PathInput>, mode: Mode) -> Result<AnyPath> {
    let value = match (src.into(), mode) {
        (PathInput::Blocking(p), Mode::Blocking) => return Ok(AnyPath::Blocking(p)),
        (PathInput::Suspend(p), Mode::Suspend) => return Ok(AnyPath::Suspend(p)),
        (PathInput::Blocking(p), _) => p.value().clone(),
        (PathInput::Suspend(p), _) => p.value().clone(),
        (PathInput::Value(v), _) => v,
        (PathInput::Text(s), _) => PathValue::parse(&s)?,
    };

    let classes = classes_for(registry, &value)?;
    Ok(match mode {
        Mode::Blocking => AnyPath::Blocking(BlockingPath::from_parts(value, classes.blocking)),
        Mode::Suspend => AnyPath::Suspend(AsyncPath::from_parts(value, classes.suspend)),
    })
}

/// Generic factory: `mode` is `"sync"` or `"async"`
pub fn path(src: impl Into<PathInput>, mode: &str) -> Result<AnyPath> {
    let mode: Mode = mode.parse()?;
    resolve(Registry::global(), src, mode)
}

/// Blocking path through the global registry
pub fn blocking_path(src: impl Into<PathInput>) -> Result<BlockingPath> {
    match resolve(Registry::global(), src, Mode::Blocking)? {
        AnyPath::Blocking(p) => Ok(p),
        AnyPath::Suspend(p) => Err(Error::InvalidMode(p.class_name().to_string())),
    }
}

/// Suspend-mode path through the global registry
pub fn async_path(src: impl Into<PathInput>) -> Result<AsyncPath> {
    match resolve(Registry::global(), src, Mode::Suspend)? {
        AnyPath::Suspend(p) => Ok(p),
        AnyPath::Blocking(p) => Err(Error::InvalidMode(p.class_name().to_string())),
    }
}
