use chrono::{DateTime, Utc};

use crate::storage::ObjectStat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    File,
    Directory,
}

/// Metadata of a file or simulated directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub file_type: FileType,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    /// Entity tag of the backing object; directories without a marker have none
    pub etag: Option<String>,
}

impl Stats {
    pub fn file(stat: &ObjectStat) -> Self {
        Self {
            file_type: FileType::File,
            size: stat.size,
            mtime: stat.last_modified,
            etag: Some(stat.etag.clone()),
        }
    }

    pub fn directory(mtime: DateTime<Utc>) -> Self {
        Self { file_type: FileType::Directory, size: 0, mtime, etag: None }
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_symbolic_link(&self) -> bool {
        false
    }

    pub fn is_block_device(&self) -> bool {
        false
    }

    pub fn is_character_device(&self) -> bool {
        false
    }

    pub fn is_fifo(&self) -> bool {
        false
    }

    pub fn is_socket(&self) -> bool {
        false
    }

    /// POSIX mode bits: type plus fixed permissions
    pub fn mode(&self) -> u32 {
        match self.file_type {
            FileType::File => libc::S_IFREG as u32 | 0o644,
            FileType::Directory => libc::S_IFDIR as u32 | 0o755,
        }
    }
}

/// Directory listing entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirEntry {
    pub name: String,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, file_type: FileType) -> Self {
        Self { name: name.into(), file_type }
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }
}
