//! Cross-backend transfer coordinator
//!
//! Copy, rename and copytree between two paths. When both sides share the
//! scheme and the very same client, the backend's native operation is used.
//! Anything else is streamed through `read_bytes`/`write_bytes`, and trees are
//! re-created level by level from a walk of the source.

use crate::backend::{Backend, BlockingBackend, RmtreeOptions};
use crate::path::{as_uri, link_target_value, AsyncPath, BlockingPath, MAX_SYMLINK_HOPS};
use crate::value::PathValue;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::debug;

fn same_client<C: ?Sized>(src: &PathValue, a: &Arc<C>, dst: &PathValue, b: &Arc<C>) -> bool {
    src.scheme() == dst.scheme() && std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn join_all(base: &PathValue, segments: &[String]) -> PathValue {
    segments.iter().fold(base.clone(), |acc, seg| acc.join(seg))
}

/// Text to store for a link at `dst` pointing where `src`'s link points
fn relinked_target(src: &PathValue, raw: &str, dst: &PathValue) -> Result<String> {
    let target = link_target_value(src, raw)?;
    if target.is_local() && !dst.is_local() {
        return as_uri(&target);
    }
    Ok(target.to_string())
}

fn missing_dir_error(exists: bool, path: &PathValue) -> Error {
    if exists {
        Error::NotADirectory(path.to_string())
    } else {
        Error::NotFound(path.to_string())
    }
}

/// Next hop of a followed link; links leaving the source's scheme are refused
fn next_hop(src: &PathValue, current: &PathValue, raw: &str) -> Result<PathValue> {
    let next = link_target_value(current, raw)?;
    if next.scheme() != current.scheme() {
        return Err(Error::UnsupportedOperation(format!(
            "{src} links to {next} on another backend"
        )));
    }
    Ok(next)
}

fn too_many_hops(src: &PathValue) -> Error {
    Error::InvalidArgument(format!("too many levels of symbolic links copying {src}"))
}

/// The path whose content a followed copy of `src` reads
fn followed_source(from: &dyn BlockingBackend, src: &PathValue) -> Result<PathValue> {
    let mut current = src.clone();
    for _ in 0..MAX_SYMLINK_HOPS {
        if !from.is_symlink(&current)? {
            return Ok(current);
        }
        let raw = from.readlink(&current)?;
        current = next_hop(src, &current, &raw)?;
    }
    Err(too_many_hops(src))
}

async fn followed_source_async(from: &dyn Backend, src: &PathValue) -> Result<PathValue> {
    let mut current = src.clone();
    for _ in 0..MAX_SYMLINK_HOPS {
        if !from.is_symlink(&current).await? {
            return Ok(current);
        }
        let raw = from.readlink(&current).await?;
        current = next_hop(src, &current, &raw)?;
    }
    Err(too_many_hops(src))
}

fn stream_copy(
    from: &dyn BlockingBackend,
    src: &PathValue,
    to: &dyn BlockingBackend,
    dst: &PathValue,
    follow_symlinks: bool,
) -> Result<()> {
    if !follow_symlinks && from.is_symlink(src)? {
        let raw = from.readlink(src)?;
        let target = relinked_target(src, &raw, dst)?;
        debug!("recreating symlink {} -> {} at {}", src, target, dst);
        return to.symlink_to(dst, &target);
    }
    let source = if follow_symlinks && !src.is_local() {
        followed_source(from, src)?
    } else {
        src.clone()
    };
    let data = from.read_bytes(&source)?;
    debug!("streamed {} bytes {} -> {}", data.len(), src, dst);
    to.write_bytes(dst, data)
}

fn stream_copytree(
    from: &dyn BlockingBackend,
    src: &PathValue,
    to: &dyn BlockingBackend,
    dst: &PathValue,
    follow_symlinks: bool,
) -> Result<()> {
    if !from.is_dir(src)? {
        return Err(missing_dir_error(from.exists(src)?, src));
    }
    to.mkdir(dst, true, true)?;
    for entry in from.walk(src)? {
        let target_dir = join_all(dst, &entry.dirpath.relative_to(src)?);
        for name in &entry.dirnames {
            to.mkdir(&target_dir.join(name), true, true)?;
        }
        for name in &entry.filenames {
            stream_copy(
                from,
                &entry.dirpath.join(name),
                to,
                &target_dir.join(name),
                follow_symlinks,
            )?;
        }
    }
    Ok(())
}

/// Copy one file from `src` to `dst`
pub fn copy(src: &BlockingPath, dst: &BlockingPath, follow_symlinks: bool) -> Result<()> {
    let (from, to) = (src.backend()?, dst.backend()?);
    if same_client(src.value(), &from, dst.value(), &to) {
        debug!("native copy {} -> {}", src, dst);
        return from.copy(src.value(), dst.value(), follow_symlinks);
    }
    stream_copy(
        from.as_ref(),
        src.value(),
        to.as_ref(),
        dst.value(),
        follow_symlinks,
    )
}

/// Copy the directory tree rooted at `src` to `dst`
pub fn copytree(src: &BlockingPath, dst: &BlockingPath, follow_symlinks: bool) -> Result<()> {
    let (from, to) = (src.backend()?, dst.backend()?);
    if same_client(src.value(), &from, dst.value(), &to) {
        debug!("native copytree {} -> {}", src, dst);
        return from.copytree(src.value(), dst.value(), follow_symlinks);
    }
    stream_copytree(
        from.as_ref(),
        src.value(),
        to.as_ref(),
        dst.value(),
        follow_symlinks,
    )
}

/// Move `src` to `dst`, overwriting an existing file
pub fn rename(src: &BlockingPath, dst: &BlockingPath) -> Result<()> {
    let (from, to) = (src.backend()?, dst.backend()?);
    if same_client(src.value(), &from, dst.value(), &to) {
        debug!("native rename {} -> {}", src, dst);
        return from.rename(src.value(), dst.value());
    }
    if from.is_dir(src.value())? {
        stream_copytree(from.as_ref(), src.value(), to.as_ref(), dst.value(), false)?;
        return from.rmtree(src.value(), &RmtreeOptions::default());
    }
    stream_copy(from.as_ref(), src.value(), to.as_ref(), dst.value(), false)?;
    from.delete(src.value())
}

async fn stream_copy_async(
    from: &dyn Backend,
    src: &PathValue,
    to: &dyn Backend,
    dst: &PathValue,
    follow_symlinks: bool,
) -> Result<()> {
    if !follow_symlinks && from.is_symlink(src).await? {
        let raw = from.readlink(src).await?;
        let target = relinked_target(src, &raw, dst)?;
        debug!("recreating symlink {} -> {} at {}", src, target, dst);
        return to.symlink_to(dst, &target).await;
    }
    let source = if follow_symlinks && !src.is_local() {
        followed_source_async(from, src).await?
    } else {
        src.clone()
    };
    let data = from.read_bytes(&source).await?;
    debug!("streamed {} bytes {} -> {}", data.len(), src, dst);
    to.write_bytes(dst, data).await
}

async fn stream_copytree_async(
    from: &dyn Backend,
    src: &PathValue,
    to: &dyn Backend,
    dst: &PathValue,
    follow_symlinks: bool,
) -> Result<()> {
    if !from.is_dir(src).await? {
        return Err(missing_dir_error(from.exists(src).await?, src));
    }
    to.mkdir(dst, true, true).await?;
    for entry in from.walk(src).await? {
        let target_dir = join_all(dst, &entry.dirpath.relative_to(src)?);
        for name in &entry.dirnames {
            to.mkdir(&target_dir.join(name), true, true).await?;
        }
        for name in &entry.filenames {
            stream_copy_async(
                from,
                &entry.dirpath.join(name),
                to,
                &target_dir.join(name),
                follow_symlinks,
            )
            .await?;
        }
    }
    Ok(())
}

/// Suspend-mode [`copy`]
pub async fn copy_async(src: &AsyncPath, dst: &AsyncPath, follow_symlinks: bool) -> Result<()> {
    let (from, to) = (src.backend()?, dst.backend()?);
    if same_client(src.value(), &from, dst.value(), &to) {
        debug!("native copy {} -> {}", src, dst);
        return from.copy(src.value(), dst.value(), follow_symlinks).await;
    }
    stream_copy_async(
        from.as_ref(),
        src.value(),
        to.as_ref(),
        dst.value(),
        follow_symlinks,
    )
    .await
}

/// Suspend-mode [`copytree`]
pub async fn copytree_async(
    src: &AsyncPath,
    dst: &AsyncPath,
    follow_symlinks: bool,
) -> Result<()> {
    let (from, to) = (src.backend()?, dst.backend()?);
    if same_client(src.value(), &from, dst.value(), &to) {
        debug!("native copytree {} -> {}", src, dst);
        return from
            .copytree(src.value(), dst.value(), follow_symlinks)
            .await;
    }
    stream_copytree_async(
        from.as_ref(),
        src.value(),
        to.as_ref(),
        dst.value(),
        follow_symlinks,
    )
    .await
}

/// Suspend-mode [`rename`]
pub async fn rename_async(src: &AsyncPath, dst: &AsyncPath) -> Result<()> {
    let (from, to) = (src.backend()?, dst.backend()?);
    if same_client(src.value(), &from, dst.value(), &to) {
        debug!("native rename {} -> {}", src, dst);
        return from.rename(src.value(), dst.value()).await;
    }
    if from.is_dir(src.value()).await? {
        stream_copytree_async(from.as_ref(), src.value(), to.as_ref(), dst.value(), false).await?;
        return from.rmtree(src.value(), &RmtreeOptions::default()).await;
    }
    stream_copy_async(from.as_ref(), src.value(), to.as_ref(), dst.value(), false).await?;
    from.delete(src.value()).await
}
