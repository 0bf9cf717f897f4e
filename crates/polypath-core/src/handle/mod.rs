//! Streaming file handles
//!
//! A handle turns a backend's whole-object upload and chunked download into
//! buffered, forward-seekable file I/O. Reads pull chunks on demand, writes
//! accumulate in memory and are uploaded once on close.

mod async_handle;
mod blocking_handle;
mod buffer;

pub use async_handle::FileHandle;
pub use blocking_handle::{BlockingFileHandle, ByteLines, Lines};

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// What an open handle may do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    Append,
}

/// Parsed `open()` mode string (`r`, `rb`, `w`, `wt`, `a`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenMode {
    pub access: Access,
    pub binary: bool,
}

impl OpenMode {
    pub const READ: OpenMode = OpenMode {
        access: Access::Read,
        binary: false,
    };
    pub const READ_BINARY: OpenMode = OpenMode {
        access: Access::Read,
        binary: true,
    };
    pub const WRITE: OpenMode = OpenMode {
        access: Access::Write,
        binary: false,
    };
    pub const WRITE_BINARY: OpenMode = OpenMode {
        access: Access::Write,
        binary: true,
    };
    pub const APPEND: OpenMode = OpenMode {
        access: Access::Append,
        binary: false,
    };

    pub fn is_read(&self) -> bool {
        self.access == Access::Read
    }
}

impl FromStr for OpenMode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self> {
        let unsupported = || Error::UnsupportedMode(mode.to_string());
        let mut access = None;
        let mut binary = None;

        for ch in mode.chars() {
            let slot_taken = match ch {
                'r' => access.replace(Access::Read).is_some(),
                'w' => access.replace(Access::Write).is_some(),
                'a' => access.replace(Access::Append).is_some(),
                'b' => binary.replace(true).is_some(),
                't' => binary.replace(false).is_some(),
                _ => return Err(unsupported()),
            };
            if slot_taken {
                return Err(unsupported());
            }
        }

        Ok(Self {
            access: access.ok_or_else(unsupported)?,
            binary: binary.unwrap_or(false),
        })
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self.access {
            Access::Read => "r",
            Access::Write => "w",
            Access::Append => "a",
        };
        write!(f, "{}{}", access, if self.binary { "b" } else { "" })
    }
}

/// Reference point for `seek`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl TryFrom<i32> for Whence {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            other => Err(Error::InvalidArgument(format!("invalid whence ({other})"))),
        }
    }
}

/// Absolute target of a seek on a stream currently at `position`
pub(crate) fn seek_target(position: u64, offset: i64, whence: Whence) -> Result<u64> {
    let target = match whence {
        Whence::End => return Err(Error::EndSeekUnsupported),
        Whence::Start => offset,
        Whence::Current => i64::try_from(position)
            .ok()
            .and_then(|p| p.checked_add(offset))
            .ok_or_else(|| Error::InvalidArgument(format!("seek offset {offset} overflows")))?,
    };
    u64::try_from(target)
        .map_err(|_| Error::InvalidArgument(format!("negative seek position {target}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("r".parse::<OpenMode>().unwrap(), OpenMode::READ);
        assert_eq!("rb".parse::<OpenMode>().unwrap(), OpenMode::READ_BINARY);
        assert_eq!("bw".parse::<OpenMode>().unwrap(), OpenMode::WRITE_BINARY);
        assert_eq!("at".parse::<OpenMode>().unwrap(), OpenMode::APPEND);

        for bad in ["", "x", "r+", "rw", "rbt", "q"] {
            let err = bad.parse::<OpenMode>().unwrap_err();
            assert!(matches!(err, Error::UnsupportedMode(_)), "{bad}");
        }
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(OpenMode::READ_BINARY.to_string(), "rb");
        assert_eq!(OpenMode::APPEND.to_string(), "a");
    }

    #[test]
    fn test_whence() {
        assert_eq!(Whence::try_from(1).unwrap(), Whence::Current);
        assert!(matches!(Whence::try_from(7), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_seek_target() {
        assert_eq!(seek_target(3, 4, Whence::Start).unwrap(), 4);
        assert_eq!(seek_target(3, 4, Whence::Current).unwrap(), 7);
        assert!(matches!(
            seek_target(3, 0, Whence::End),
            Err(Error::EndSeekUnsupported)
        ));
        assert!(seek_target(3, -5, Whence::Current).is_err());
    }
}
