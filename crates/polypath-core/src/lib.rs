//! Polypath - one path type for local disks and flat object stores
//!
//! This library provides filesystem-style paths whose I/O goes to the local
//! filesystem or to an object store (S3, GCS, Azure, in-memory), with a
//! blocking and a suspend-mode (async) flavour of every operation.
//!
//! Object stores have no directories; the emulation layer synthesizes them
//! from key prefixes and empty `prefix/` marker objects.

pub mod backend;
pub mod bridge;
pub mod class;
pub mod config;
pub mod emulation;
pub mod error;
pub mod handle;
pub mod local;
pub mod memory;
pub mod object;
pub mod path;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod store;
pub mod transfer;
pub mod value;

pub use error::{Error, Result};

// Re-export commonly used types
pub use backend::{
    Backend, BlockingBackend, ClientHandle, Metadata, RmtreeOptions, Stat, WalkEntry,
    DEFAULT_CHUNK_SIZE,
};
pub use class::{ClassPair, PathClass};
pub use config::Config;
pub use handle::{BlockingFileHandle, FileHandle, OpenMode, Whence};
pub use path::{AsyncPath, BlockingPath};
pub use registry::{Registry, SchemeEntry, MEMORY_SCHEME};
pub use router::{async_path, blocking_path, path, AnyPath, Mode, PathInput};
pub use store::{Listing, ObjectClient, ObjectInfo};
pub use value::PathValue;
