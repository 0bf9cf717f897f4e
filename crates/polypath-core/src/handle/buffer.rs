//! Buffer management for streaming file handles

use crate::{Error, Result};
use bytes::{Buf, Bytes, BytesMut};

/// Bytes pulled from a chunk stream but not yet handed to the caller
///
/// `consumed` counts every byte ever pulled from the source, so the logical
/// position is `consumed - buffered`.
#[derive(Debug, Default)]
pub(crate) struct ReadBuffer {
    data: BytesMut,
    consumed: u64,
    eof: bool,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk from the source
    pub fn push(&mut self, chunk: Bytes) {
        self.consumed += chunk.len() as u64;
        self.data.extend_from_slice(&chunk);
    }

    /// The source is exhausted
    pub fn finish(&mut self) {
        self.eof = true;
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn position(&self) -> u64 {
        self.consumed - self.data.len() as u64
    }

    /// Start over for a re-opened source
    pub fn reset(&mut self) {
        self.data.clear();
        self.consumed = 0;
        self.eof = false;
    }

    /// Access for `BufRead::fill_buf`
    pub fn chunk(&self) -> &[u8] {
        &self.data
    }

    pub fn advance(&mut self, n: usize) {
        self.data.advance(n.min(self.data.len()));
    }

    fn take(&mut self, n: usize) -> Bytes {
        let n = n.min(self.data.len());
        self.data.split_to(n).freeze()
    }

    /// `n` bytes, or everything with `None`; `None` back means pull more
    pub fn try_read(&mut self, size: Option<usize>) -> Option<Bytes> {
        match size {
            Some(n) if self.data.len() >= n => Some(self.take(n)),
            _ if self.eof => Some(self.take(self.data.len())),
            _ => None,
        }
    }

    /// One line including its `\n`, capped at `limit` bytes
    pub fn try_readline(&mut self, limit: Option<usize>) -> Option<Bytes> {
        let window = limit.map_or(self.data.len(), |l| l.min(self.data.len()));
        if let Some(idx) = self.data[..window].iter().position(|b| *b == b'\n') {
            return Some(self.take(idx + 1));
        }
        if limit.is_some_and(|l| self.data.len() >= l) || self.eof {
            return Some(self.take(window));
        }
        None
    }

    /// Byte length of the first `n` characters if they are all buffered
    fn char_prefix(&self, n: usize) -> Result<Option<usize>> {
        let valid = match std::str::from_utf8(&self.data) {
            Ok(text) => text,
            Err(err) => {
                if err.error_len().is_some() || self.eof {
                    return Err(Error::InvalidArgument(format!(
                        "stream is not valid UTF-8 at byte {}",
                        self.position() + err.valid_up_to() as u64
                    )));
                }
                // Incomplete trailing sequence; the valid prefix is usable
                std::str::from_utf8(&self.data[..err.valid_up_to()]).unwrap_or_default()
            }
        };
        Ok(valid
            .char_indices()
            .nth(n)
            .map(|(idx, _)| idx)
            .or_else(|| (valid.chars().count() == n).then_some(valid.len())))
    }

    fn take_text(&mut self, n_bytes: usize) -> Result<String> {
        let bytes = self.take(n_bytes);
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::InvalidArgument(format!("stream is not valid UTF-8: {e}")))
    }

    /// `n` characters, or everything with `None`
    pub fn try_read_text(&mut self, size: Option<usize>) -> Result<Option<String>> {
        if let Some(n) = size {
            if let Some(end) = self.char_prefix(n)? {
                return self.take_text(end).map(Some);
            }
        }
        if self.eof {
            let all = self.data.len();
            return self.take_text(all).map(Some);
        }
        Ok(None)
    }

    /// One line, capped at `limit` characters
    pub fn try_readline_text(&mut self, limit: Option<usize>) -> Result<Option<String>> {
        let capped = match limit {
            Some(l) => self.char_prefix(l)?,
            None => None,
        };
        let window = capped.unwrap_or(self.data.len());
        if let Some(idx) = self.data[..window].iter().position(|b| *b == b'\n') {
            return self.take_text(idx + 1).map(Some);
        }
        if capped.is_some() || self.eof {
            return self.take_text(window).map(Some);
        }
        Ok(None)
    }

    /// Drop up to `n` bytes; returns how many were dropped
    pub fn discard(&mut self, n: u64) -> u64 {
        let n = n.min(self.data.len() as u64);
        self.data.advance(n as usize);
        n
    }
}

/// Accumulates writes until the handle is closed
#[derive(Debug, Default)]
pub(crate) struct WriteBuffer {
    buffer: BytesMut,
}

impl WriteBuffer {
    /// Start with existing content (append mode)
    pub fn with_content(initial: &[u8]) -> Self {
        let mut buffer = BytesMut::with_capacity(initial.len());
        buffer.extend_from_slice(initial);
        Self { buffer }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn write(&mut self, data: &[u8]) -> usize {
        self.buffer.extend_from_slice(data);
        data.len()
    }

    /// Copy of the contents, leaving the buffer intact for a retried close
    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buffer)
    }

    /// Take the buffer contents, leaving it empty
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(chunks: &[&str], eof: bool) -> ReadBuffer {
        let mut buffer = ReadBuffer::new();
        for chunk in chunks {
            buffer.push(Bytes::copy_from_slice(chunk.as_bytes()));
        }
        if eof {
            buffer.finish();
        }
        buffer
    }

    #[test]
    fn test_read_needs_more_until_eof() {
        let mut buffer = filled(&["012"], false);
        assert!(buffer.try_read(Some(5)).is_none());
        assert_eq!(buffer.try_read(Some(2)).unwrap(), &b"01"[..]);
        assert_eq!(buffer.position(), 2);
        buffer.finish();
        assert_eq!(buffer.try_read(Some(5)).unwrap(), &b"2"[..]);
        assert_eq!(buffer.try_read(None).unwrap(), Bytes::new());
    }

    #[test]
    fn test_readline() {
        let mut buffer = filled(&["ab\ncd"], false);
        assert_eq!(buffer.try_readline(None).unwrap(), &b"ab\n"[..]);
        assert!(buffer.try_readline(None).is_none());
        assert_eq!(buffer.try_readline(Some(1)).unwrap(), &b"c"[..]);
        buffer.finish();
        assert_eq!(buffer.try_readline(None).unwrap(), &b"d"[..]);
    }

    #[test]
    fn test_text_waits_for_complete_characters() {
        let euro = "€".as_bytes();
        let mut buffer = ReadBuffer::new();
        buffer.push(Bytes::copy_from_slice(&euro[..1]));
        assert!(buffer.try_read_text(Some(1)).unwrap().is_none());
        buffer.push(Bytes::copy_from_slice(&euro[1..]));
        assert_eq!(buffer.try_read_text(Some(1)).unwrap().unwrap(), "€");
        assert_eq!(buffer.position(), 3);
    }

    #[test]
    fn test_text_lines() {
        let mut buffer = filled(&["héllo\nwörld"], true);
        assert_eq!(buffer.try_readline_text(None).unwrap().unwrap(), "héllo\n");
        assert_eq!(buffer.try_readline_text(Some(2)).unwrap().unwrap(), "wö");
        assert_eq!(buffer.try_readline_text(None).unwrap().unwrap(), "rld");
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buffer = ReadBuffer::new();
        buffer.push(Bytes::from_static(&[0xff, 0x41]));
        assert!(buffer.try_read_text(Some(1)).is_err());
    }

    #[test]
    fn test_discard_and_reset() {
        let mut buffer = filled(&["0123456789"], false);
        assert_eq!(buffer.discard(4), 4);
        assert_eq!(buffer.position(), 4);
        buffer.reset();
        assert_eq!(buffer.position(), 0);
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_write_buffer() {
        let mut buffer = WriteBuffer::with_content(b"Existing ");
        buffer.write(b"Append");
        assert_eq!(buffer.snapshot(), &b"Existing Append"[..]);
        assert_eq!(buffer.len(), 15);
        assert_eq!(buffer.take(), &b"Existing Append"[..]);
        assert_eq!(buffer.len(), 0);
    }
}
