//! Suspend-mode file handle

use super::buffer::{ReadBuffer, WriteBuffer};
use super::{seek_target, Access, OpenMode, Whence};
use crate::backend::{Backend, ChunkStream};
use crate::value::PathValue;
use crate::{Error, Result};
use bytes::Bytes;
use futures_util::StreamExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

enum State {
    Reading {
        source: ChunkStream,
        buffer: ReadBuffer,
    },
    Writing {
        buffer: WriteBuffer,
    },
    Closed,
}

/// Buffered file handle over a suspend-mode backend
///
/// Must be closed with [`FileHandle::close`]; a handle dropped while writing
/// uploads its buffer on the current Tokio runtime when there is one.
pub struct FileHandle {
    backend: Arc<dyn Backend>,
    path: PathValue,
    mode: OpenMode,
    chunk_size: usize,
    state: State,
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Reading { .. } => "reading",
            State::Writing { .. } => "writing",
            State::Closed => "closed",
        };
        f.debug_struct("FileHandle")
            .field("path", &self.path.to_string())
            .field("mode", &self.mode.to_string())
            .field("state", &state)
            .finish()
    }
}

impl FileHandle {
    /// Open `path`; read mode starts the download, append mode fetches the
    /// existing content first
    pub async fn open(
        backend: Arc<dyn Backend>,
        path: PathValue,
        mode: OpenMode,
        chunk_size: usize,
    ) -> Result<Self> {
        let state = match mode.access {
            Access::Read => State::Reading {
                source: backend.read_stream(&path, chunk_size).await?,
                buffer: ReadBuffer::new(),
            },
            Access::Write => State::Writing {
                buffer: WriteBuffer::default(),
            },
            Access::Append => {
                let existing = match backend.read_bytes(&path).await {
                    Ok(data) => data,
                    Err(err) if err.is_not_found() => Bytes::new(),
                    Err(err) => return Err(err),
                };
                State::Writing {
                    buffer: WriteBuffer::with_content(&existing),
                }
            }
        };
        debug!("opened {} in mode {}", path, mode);
        Ok(Self {
            backend,
            path,
            mode,
            chunk_size,
            state,
        })
    }

    pub fn path(&self) -> &PathValue {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    fn reading(&mut self) -> Result<(&mut ChunkStream, &mut ReadBuffer)> {
        match &mut self.state {
            State::Reading { source, buffer } => Ok((source, buffer)),
            State::Writing { .. } => Err(Error::UnsupportedOperation(format!(
                "{} is not open for reading",
                self.path
            ))),
            State::Closed => Err(Error::UseAfterClose),
        }
    }

    fn writing(&mut self) -> Result<&mut WriteBuffer> {
        match &mut self.state {
            State::Writing { buffer } => Ok(buffer),
            State::Reading { .. } => Err(Error::UnsupportedOperation(format!(
                "{} is not open for writing",
                self.path
            ))),
            State::Closed => Err(Error::UseAfterClose),
        }
    }

    fn require_binary(&self, binary: bool) -> Result<()> {
        if self.is_closed() {
            return Err(Error::UseAfterClose);
        }
        if self.mode.binary != binary {
            let (wanted, actual) = if binary {
                ("binary", "text")
            } else {
                ("text", "binary")
            };
            return Err(Error::UnsupportedOperation(format!(
                "{wanted} read on a {actual} handle for {}",
                self.path
            )));
        }
        Ok(())
    }

    /// Pull chunks until `attempt` can answer from the buffer
    async fn fill_until<T>(
        &mut self,
        mut attempt: impl FnMut(&mut ReadBuffer) -> Result<Option<T>>,
    ) -> Result<T> {
        let (source, buffer) = self.reading()?;
        loop {
            if let Some(out) = attempt(buffer)? {
                return Ok(out);
            }
            match source.next().await {
                Some(chunk) => {
                    let chunk = chunk?;
                    trace!("pulled {} bytes", chunk.len());
                    buffer.push(chunk);
                }
                None => buffer.finish(),
            }
        }
    }

    /// Read `size` bytes, or everything left with `None`
    pub async fn read(&mut self, size: Option<usize>) -> Result<Bytes> {
        self.require_binary(true)?;
        self.fill_until(|buffer| Ok(buffer.try_read(size))).await
    }

    /// Next line including its newline, capped at `limit` bytes
    pub async fn readline(&mut self, limit: Option<usize>) -> Result<Bytes> {
        self.require_binary(true)?;
        self.fill_until(|buffer| Ok(buffer.try_readline(limit)))
            .await
    }

    /// Read `size` characters, or everything left with `None`
    pub async fn read_text(&mut self, size: Option<usize>) -> Result<String> {
        self.require_binary(false)?;
        self.fill_until(|buffer| buffer.try_read_text(size)).await
    }

    /// Next line including its newline, capped at `limit` characters
    pub async fn readline_text(&mut self, limit: Option<usize>) -> Result<String> {
        self.require_binary(false)?;
        self.fill_until(|buffer| buffer.try_readline_text(limit))
            .await
    }

    /// Remaining lines of a text handle
    pub async fn readlines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Line iteration for text handles; `None` at end of stream
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let line = self.readline_text(None).await?;
        Ok((!line.is_empty()).then_some(line))
    }

    /// Remaining lines of a binary handle
    pub async fn readlines_bytes(&mut self) -> Result<Vec<Bytes>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_byte_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Line iteration for binary handles; `None` at end of stream
    pub async fn next_byte_line(&mut self) -> Result<Option<Bytes>> {
        let line = self.readline(None).await?;
        Ok((!line.is_empty()).then_some(line))
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.writing()?.write(data))
    }

    /// Returns the number of characters written
    pub fn write_str(&mut self, text: &str) -> Result<usize> {
        self.writing()?.write(text.as_bytes());
        Ok(text.chars().count())
    }

    pub fn writelines<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let buffer = self.writing()?;
        for line in lines {
            buffer.write(line.as_ref().as_bytes());
        }
        Ok(())
    }

    /// Bytes consumed by the caller so far
    pub fn tell(&self) -> Result<u64> {
        match &self.state {
            State::Reading { buffer, .. } => Ok(buffer.position()),
            State::Writing { .. } => Err(Error::UnsupportedOperation(format!(
                "tell on {} opened for writing",
                self.path
            ))),
            State::Closed => Err(Error::UseAfterClose),
        }
    }

    /// Forward-only seek; position 0 re-opens the download
    pub async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let position = self.tell()?;
        let target = seek_target(position, offset, whence)?;

        if target == 0 {
            trace!("rewinding {} by re-opening the stream", self.path);
            let fresh = self
                .backend
                .read_stream(&self.path, self.chunk_size)
                .await?;
            let (source, buffer) = self.reading()?;
            *source = fresh;
            buffer.reset();
            return Ok(0);
        }
        if target < position {
            return Err(Error::BackwardSeekUnsupported { position, target });
        }

        let mut remaining = target - position;
        self.fill_until(|buffer| {
            remaining -= buffer.discard(remaining);
            Ok((remaining == 0 || buffer.is_eof()).then_some(()))
        })
        .await?;
        self.tell()
    }

    /// Upload buffered writes; safe to call again, also after a cancelled close
    pub async fn close(&mut self) -> Result<()> {
        let data = match &self.state {
            State::Closed => return Ok(()),
            State::Reading { .. } => None,
            State::Writing { buffer } => Some(buffer.snapshot()),
        };
        if let Some(data) = data {
            debug!("flushing {} bytes to {}", data.len(), self.path);
            self.backend.write_bytes(&self.path, data).await?;
        }
        self.state = State::Closed;
        Ok(())
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        let State::Writing { buffer } = &mut self.state else {
            return;
        };
        let data = buffer.take();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!("{} dropped without close; uploading in the background", self.path);
                let backend = self.backend.clone();
                let path = self.path.clone();
                runtime.spawn(async move {
                    if let Err(e) = backend.write_bytes(&path, data).await {
                        warn!("Failed to flush {} on drop: {}", path, e);
                    }
                });
            }
            Err(_) => warn!(
                "{} dropped without close outside a runtime; {} bytes lost",
                self.path,
                data.len()
            ),
        }
    }
}
