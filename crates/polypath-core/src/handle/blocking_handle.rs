//! Blocking-mode file handle

use super::buffer::{ReadBuffer, WriteBuffer};
use super::{seek_target, Access, OpenMode, Whence};
use crate::backend::{BlockingBackend, ChunkIter};
use crate::value::PathValue;
use crate::{Error, Result};
use bytes::Bytes;
use std::fmt;
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tracing::{debug, trace, warn};

enum State {
    Reading { source: ChunkIter, buffer: ReadBuffer },
    Writing { buffer: WriteBuffer },
    Closed,
}

/// Buffered file handle over a blocking backend
///
/// Also usable through `std::io::{Read, BufRead, Write, Seek}`. Dropping the
/// handle closes it.
pub struct BlockingFileHandle {
    backend: Arc<dyn BlockingBackend>,
    path: PathValue,
    mode: OpenMode,
    chunk_size: usize,
    state: State,
}

impl fmt::Debug for BlockingFileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Reading { .. } => "reading",
            State::Writing { .. } => "writing",
            State::Closed => "closed",
        };
        f.debug_struct("BlockingFileHandle")
            .field("path", &self.path.to_string())
            .field("mode", &self.mode.to_string())
            .field("state", &state)
            .finish()
    }
}

impl BlockingFileHandle {
    pub fn open(
        backend: Arc<dyn BlockingBackend>,
        path: PathValue,
        mode: OpenMode,
        chunk_size: usize,
    ) -> Result<Self> {
        let state = match mode.access {
            Access::Read => State::Reading {
                source: backend.read_stream(&path, chunk_size)?,
                buffer: ReadBuffer::new(),
            },
            Access::Write => State::Writing {
                buffer: WriteBuffer::default(),
            },
            Access::Append => {
                let existing = match backend.read_bytes(&path) {
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

    fn reading(&mut self) -> Result<(&mut ChunkIter, &mut ReadBuffer)> {
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
            return Err(Error::UnsupportedOperation(format!(
                "{} read on {} opened in mode {}",
                if binary { "binary" } else { "text" },
                self.path,
                self.mode
            )));
        }
        Ok(())
    }

    fn pull(source: &mut ChunkIter, buffer: &mut ReadBuffer) -> Result<()> {
        match source.next() {
            Some(chunk) => {
                let chunk = chunk?;
                trace!("pulled {} bytes", chunk.len());
                buffer.push(chunk);
            }
            None => buffer.finish(),
        }
        Ok(())
    }

    fn fill_until<T>(
        &mut self,
        mut attempt: impl FnMut(&mut ReadBuffer) -> Result<Option<T>>,
    ) -> Result<T> {
        let (source, buffer) = self.reading()?;
        loop {
            if let Some(out) = attempt(buffer)? {
                return Ok(out);
            }
            Self::pull(source, buffer)?;
        }
    }

    /// Read `size` bytes, or everything left with `None`
    pub fn read(&mut self, size: Option<usize>) -> Result<Bytes> {
        self.require_binary(true)?;
        self.fill_until(|buffer| Ok(buffer.try_read(size)))
    }

    pub fn readline(&mut self, limit: Option<usize>) -> Result<Bytes> {
        self.require_binary(true)?;
        self.fill_until(|buffer| Ok(buffer.try_readline(limit)))
    }

    /// Read `size` characters, or everything left with `None`
    pub fn read_text(&mut self, size: Option<usize>) -> Result<String> {
        self.require_binary(false)?;
        self.fill_until(|buffer| buffer.try_read_text(size))
    }

    pub fn readline_text(&mut self, limit: Option<usize>) -> Result<String> {
        self.require_binary(false)?;
        self.fill_until(|buffer| buffer.try_readline_text(limit))
    }

    pub fn readlines(&mut self) -> Result<Vec<String>> {
        self.lines().collect()
    }

    /// Iterate over the remaining lines of a text handle
    pub fn lines(&mut self) -> Lines<'_> {
        Lines { handle: self }
    }

    pub fn readlines_bytes(&mut self) -> Result<Vec<Bytes>> {
        self.byte_lines().collect()
    }

    /// Iterate over the remaining lines of a binary handle
    pub fn byte_lines(&mut self) -> ByteLines<'_> {
        ByteLines { handle: self }
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
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let position = self.tell()?;
        let target = seek_target(position, offset, whence)?;

        if target == 0 {
            trace!("rewinding {} by re-opening the stream", self.path);
            let fresh = self.backend.read_stream(&self.path, self.chunk_size)?;
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
        })?;
        self.tell()
    }

    /// Upload buffered writes; idempotent
    pub fn close(&mut self) -> Result<()> {
        let data = match &self.state {
            State::Closed => return Ok(()),
            State::Reading { .. } => None,
            State::Writing { buffer } => Some(buffer.snapshot()),
        };
        if let Some(data) = data {
            debug!("flushing {} bytes to {}", data.len(), self.path);
            self.backend.write_bytes(&self.path, data)?;
        }
        self.state = State::Closed;
        Ok(())
    }
}

/// Line iterator returned by [`BlockingFileHandle::lines`]
#[derive(Debug)]
pub struct Lines<'a> {
    handle: &'a mut BlockingFileHandle,
}

impl Iterator for Lines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.handle.readline_text(None) {
            Ok(line) if line.is_empty() => None,
            other => Some(other),
        }
    }
}

/// Line iterator returned by [`BlockingFileHandle::byte_lines`]
#[derive(Debug)]
pub struct ByteLines<'a> {
    handle: &'a mut BlockingFileHandle,
}

impl Iterator for ByteLines<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.handle.readline(None) {
            Ok(line) if line.is_empty() => None,
            other => Some(other),
        }
    }
}

impl Read for BlockingFileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for BlockingFileHandle {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let (source, buffer) = self.reading()?;
        while buffer.len() == 0 && !buffer.is_eof() {
            Self::pull(source, buffer)?;
        }
        Ok(buffer.chunk())
    }

    fn consume(&mut self, amt: usize) {
        if let State::Reading { buffer, .. } = &mut self.state {
            buffer.advance(amt);
        }
    }
}

impl Write for BlockingFileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(BlockingFileHandle::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Objects are uploaded whole on close
        Ok(())
    }
}

impl Seek for BlockingFileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(offset) => (
                i64::try_from(offset).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek offset out of range")
                })?,
                Whence::Start,
            ),
            SeekFrom::Current(offset) => (offset, Whence::Current),
            SeekFrom::End(offset) => (offset, Whence::End),
        };
        Ok(BlockingFileHandle::seek(self, offset, whence)?)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.tell()?)
    }
}

impl Drop for BlockingFileHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close {} on drop: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Blocking;
    use crate::memory::MemoryClient;
    use crate::object::ObjectBackend;

    fn seeded(content: &str) -> (Arc<dyn BlockingBackend>, PathValue) {
        let backend: Arc<dyn BlockingBackend> = Arc::new(Blocking::new(ObjectBackend::new(
            "memory",
            Arc::new(MemoryClient::new()),
        )));
        let path = PathValue::parse("memory://b/file").unwrap();
        backend.write_text(&path, content).unwrap();
        (backend, path)
    }

    #[test]
    fn test_forward_only_seek() {
        let (backend, path) = seeded("0123456789");
        let mut handle = BlockingFileHandle::open(backend, path, OpenMode::READ_BINARY, 4).unwrap();
        handle.seek(3, Whence::Start).unwrap();
        assert_eq!(handle.read(Some(3)).unwrap(), &b"345"[..]);
        assert!(handle.seek(1, Whence::Start).is_err());
        assert_eq!(handle.seek(2, Whence::Current).unwrap(), 8);
        assert_eq!(handle.read(None).unwrap(), &b"89"[..]);
        assert_eq!(handle.read(None).unwrap(), Bytes::new());
    }

    #[test]
    fn test_std_io_traits() {
        let (backend, path) = seeded("alpha\nbeta\n");
        let mut handle =
            BlockingFileHandle::open(backend.clone(), path.clone(), OpenMode::READ_BINARY, 3)
                .unwrap();
        let mut first = String::new();
        handle.read_line(&mut first).unwrap();
        assert_eq!(first, "alpha\n");
        let mut rest = String::new();
        handle.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "beta\n");
        assert_eq!(handle.stream_position().unwrap(), 11);

        let out = PathValue::parse("memory://b/out").unwrap();
        let mut writer =
            BlockingFileHandle::open(backend.clone(), out.clone(), OpenMode::WRITE_BINARY, 0)
                .unwrap();
        writeln!(writer, "line {}", 1).unwrap();
        drop(writer);
        assert_eq!(backend.read_text(&out).unwrap(), "line 1\n");
    }

    #[test]
    fn test_lines_iterator() {
        let (backend, path) = seeded("a\nb\nc");
        let mut handle = BlockingFileHandle::open(backend, path, OpenMode::READ, 1).unwrap();
        let lines: Vec<String> = BlockingFileHandle::lines(&mut handle).collect::<Result<_>>().unwrap();
        assert_eq!(lines, vec!["a\n", "b\n", "c"]);
    }

    #[test]
    fn test_byte_lines_iterator() {
        let (backend, path) = seeded("");
        backend
            .write_bytes(&path, Bytes::from_static(b"\x00\xff\nraw\n\xfe"))
            .unwrap();
        let mut handle =
            BlockingFileHandle::open(backend.clone(), path.clone(), OpenMode::READ_BINARY, 2)
                .unwrap();
        let lines: Vec<Bytes> = handle.byte_lines().collect::<Result<_>>().unwrap();
        assert_eq!(
            lines,
            vec![
                Bytes::from_static(b"\x00\xff\n"),
                Bytes::from_static(b"raw\n"),
                Bytes::from_static(b"\xfe"),
            ]
        );
        assert!(handle.byte_lines().next().is_none());

        let mut text = BlockingFileHandle::open(backend, path, OpenMode::READ, 0).unwrap();
        let err = text.byte_lines().next().unwrap().unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn test_write_mode_rejects_reads_and_tell() {
        let (backend, path) = seeded("");
        let mut handle = BlockingFileHandle::open(backend, path, OpenMode::WRITE, 0).unwrap();
        assert!(matches!(
            handle.tell().unwrap_err(),
            Error::UnsupportedOperation(_)
        ));
        assert!(handle.seek(0, Whence::Start).is_err());
        handle.writelines(["x\n", "y\n"]).unwrap();
        handle.close().unwrap();
        assert!(matches!(
            handle.read_text(None).unwrap_err(),
            Error::UseAfterClose
        ));
    }
}
