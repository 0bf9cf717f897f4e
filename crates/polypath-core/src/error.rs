//! Error types for polypath-core

use std::io;
use thiserror::Error;

/// Core error types shared by every backend and both path modes
#[derive(Error, Debug)]
pub enum Error {
    /// Read/stat/delete/rename/copy source is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target already exists and the caller did not allow it
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Operation needs a file but got a directory
    #[error("Is a directory: {0}")]
    IsADirectory(String),

    /// Operation needs a directory but got something else
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// rmdir on a prefix that still has children
    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// `open()` called with a mode string it does not understand
    #[error("Unsupported open mode: {0:?}")]
    UnsupportedMode(String),

    /// Bad argument (unknown whence, malformed name, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Streaming reads cannot rewind
    #[error("Backward seek not supported for streaming reads (position {position}, target {target})")]
    BackwardSeekUnsupported {
        /// Current logical position
        position: u64,
        /// Requested position
        target: u64,
    },

    /// Streaming reads do not know their length up front
    #[error("SEEK_END not supported for streaming reads")]
    EndSeekUnsupported,

    /// Any I/O on a handle after `close()`
    #[error("I/O operation on closed file")]
    UseAfterClose,

    /// Operation is not valid for the handle's mode or the backend
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// No backend is registered for the URI scheme
    #[error("Unsupported URI scheme: {0:?}")]
    UnsupportedScheme(String),

    /// Router mode string is neither blocking nor suspend
    #[error("Invalid mode: {0:?}. Must be 'sync' or 'async'")]
    InvalidMode(String),

    /// The backend's optional SDK was not compiled in
    #[error(
        "The {backend} backend requires '{package}' which is not available. \
         Rebuild with the '{feature}' feature enabled"
    )]
    MissingDependency {
        /// Human readable backend name
        backend: String,
        /// Crate that provides the backend
        package: String,
        /// Cargo feature that pulls the crate in
        feature: String,
    },

    /// Blocking and suspend paths were compared
    #[error(
        "Cannot compare {left} with {right}: blocking and async paths are never comparable. \
         Convert one side with to_async() or to_blocking()"
    )]
    CrossModeComparison {
        /// Class name on the left-hand side
        left: String,
        /// Class name on the right-hand side
        right: String,
    },

    /// Malformed URI or local path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Configuration-related error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Runtime bridge failure
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Error raised by a concrete backend that has no closer kind
    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Wrap an arbitrary backend error
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Backend(err.into())
    }

    /// Translate an `io::Error` for `path` into the matching taxonomy kind
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(path),
            io::ErrorKind::IsADirectory => Error::IsADirectory(path),
            io::ErrorKind::NotADirectory => Error::NotADirectory(path),
            io::ErrorKind::DirectoryNotEmpty => Error::DirectoryNotEmpty(path),
            _ => Error::Io(err),
        }
    }

    /// True for the not-found kind, whatever its origin
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(err) => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        if let Error::Io(io_err) = err {
            return io_err;
        }
        let kind = match &err {
            Error::NotFound(_) => io::ErrorKind::NotFound,
            Error::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            Error::IsADirectory(_) => io::ErrorKind::IsADirectory,
            Error::NotADirectory(_) => io::ErrorKind::NotADirectory,
            Error::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            Error::UnsupportedMode(_)
            | Error::InvalidArgument(_)
            | Error::InvalidPath(_)
            | Error::InvalidMode(_)
            | Error::BackwardSeekUnsupported { .. }
            | Error::EndSeekUnsupported => io::ErrorKind::InvalidInput,
            Error::UnsupportedOperation(_) | Error::UnsupportedScheme(_) => {
                io::ErrorKind::Unsupported
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kinds_map_to_taxonomy() {
        let err = Error::from_io(io::Error::from(io::ErrorKind::NotFound), "/tmp/x");
        assert!(matches!(err, Error::NotFound(ref p) if p == "/tmp/x"));
        assert!(err.is_not_found());

        let err = Error::from_io(io::Error::from(io::ErrorKind::DirectoryNotEmpty), "d");
        assert!(matches!(err, Error::DirectoryNotEmpty(_)));

        let err = Error::from_io(io::Error::from(io::ErrorKind::PermissionDenied), "p");
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_into_io_error() {
        let io_err: io::Error = Error::EndSeekUnsupported.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);

        let io_err: io::Error = Error::NotFound("s3://b/k".into()).into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);

        let original = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let io_err: io::Error = Error::Io(original).into();
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_missing_dependency_message() {
        let err = Error::MissingDependency {
            backend: "S3".into(),
            package: "object_store".into(),
            feature: "aws".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("object_store"));
        assert!(msg.contains("'aws'"));
    }
}
