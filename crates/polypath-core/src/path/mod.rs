//! Concrete path types
//!
//! [`BlockingPath`] and [`AsyncPath`] pair a [`PathValue`] with the class that
//! serves it and, optionally, a client injected for that one path. Every
//! structural operation returns the same class and carries the injected client
//! forward.

mod async_path;
mod blocking_path;

pub use async_path::AsyncPath;
pub use blocking_path::BlockingPath;

use crate::value::{split_scheme, PathValue};
use crate::{Error, Result};

/// Symlink chains longer than this are treated as loops
pub(crate) const MAX_SYMLINK_HOPS: usize = 40;

/// Where a link at `link` pointing at `target` actually points
pub(crate) fn link_target_value(link: &PathValue, target: &str) -> Result<PathValue> {
    if split_scheme(target).is_some() {
        return PathValue::parse(target);
    }
    if link.is_local() {
        if target.starts_with('/') {
            return PathValue::parse(target);
        }
        return Ok(link.parent().join(target).normalized());
    }
    let base = if target.starts_with('/') {
        PathValue::object(link.scheme().unwrap_or_default(), link.bucket(), "")
    } else {
        link.parent()
    };
    Ok(base.join(target.trim_start_matches('/')).normalized())
}

/// Text stored for a new symlink: object stores always keep an absolute URI
pub(crate) fn stored_link_target(link: &PathValue, target: &str) -> Result<String> {
    if link.is_local() {
        return Ok(target.to_string());
    }
    let value = link_target_value(link, target)?;
    if value.is_local() {
        return as_uri(&value);
    }
    Ok(value.to_string())
}

/// `file://` URI for absolute local paths, the URI itself for object paths
pub(crate) fn as_uri(value: &PathValue) -> Result<String> {
    match value.scheme() {
        Some(_) => Ok(value.to_string()),
        None if value.is_absolute() => Ok(format!("file://{value}")),
        None => Err(Error::InvalidArgument(format!(
            "relative path {value} can't be expressed as a file URI"
        ))),
    }
}

/// `scheme://bucket/` for object paths, empty for local ones
pub(crate) fn cloud_prefix(value: &PathValue) -> String {
    match value.scheme() {
        Some(_) => format!("{}/", value.anchor()),
        None => String::new(),
    }
}
