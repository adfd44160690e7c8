pub mod error;
pub mod operations;
pub mod path;
pub mod stat;
pub mod write_stream;

pub use error::{ErrorCode, FsError, FsResult};
pub use operations::FileSystem;
pub use path::{ObjectLocation, PathConverter};
pub use stat::{DirEntry, FileType, Stats};
pub use write_stream::WriteStream;
