//! Filesystem-style operations over S3-compatible object storage.
//!
//! Paths of the form `/bucket/key/...` (or `/key/...` against a bound bucket)
//! are mapped onto objects; directories are simulated with prefix listings and
//! zero-byte marker objects; backend failures surface as errno-style
//! [`FsError`]s.

pub mod config;
pub mod fs;
pub mod logging;
pub mod metrics;
pub mod storage;
pub mod stream;

pub use fs::{DirEntry, ErrorCode, FileSystem, FileType, FsError, FsResult, PathConverter, Stats};
pub use storage::{MemoryObjectStore, ObjectStoreClient};
