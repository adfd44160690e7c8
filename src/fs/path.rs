use crate::config::StorageConfig;
use crate::fs::error::{ErrorCode, FsError, FsResult};
use crate::fs::stat::{DirEntry, FileType};

pub const SEPARATOR: char = '/';
/// S3 limit on object key length, in bytes
pub const MAX_KEY_LENGTH: usize = 1024;

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Bucket and key an object path resolves to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), key: key.into() }
    }
}

/// Collapse repeated slashes and resolve `.` and `..` lexically.
///
/// The result always starts with `/` and never ends with one unless it is the
/// root. `..` at the root stays at the root.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// First segment is the bucket, the rest is the key
pub fn split_path(path: &str) -> ObjectLocation {
    let normalized = normalize_path(path);
    let trimmed = &normalized[1..];
    match trimmed.split_once(SEPARATOR) {
        Some((bucket, key)) => ObjectLocation::new(bucket, key),
        None => ObjectLocation::new(trimmed, ""),
    }
}

pub fn join_path(bucket: &str, key: &str) -> String {
    let bucket = bucket.trim_matches(SEPARATOR);
    let key = key.trim_start_matches(SEPARATOR);
    match (bucket.is_empty(), key.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => format!("/{}", bucket),
        (true, false) => format!("/{}", key),
        (false, false) => format!("/{}/{}", bucket, key),
    }
}

/// Whether the raw path names a directory (empty, root, or trailing slash)
pub fn is_directory(path: &str) -> bool {
    path.is_empty() || path.ends_with(SEPARATOR)
}

pub fn parent_path(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rfind(SEPARATOR) {
        Some(0) | None => "/".to_string(),
        Some(index) => normalized[..index].to_string(),
    }
}

pub fn basename(path: &str) -> String {
    let normalized = normalize_path(path);
    normalized.rsplit(SEPARATOR).next().unwrap_or_default().to_string()
}

pub fn validate_path(path: &str) -> FsResult<()> {
    check_characters(path)?;
    check_key_length(path, &split_path(path).key)
}

fn check_characters(path: &str) -> FsResult<()> {
    if path.is_empty() {
        return Err(FsError::new(ErrorCode::InvalidArgument, "path must not be empty").with_path(path));
    }

    if let Some(c) = path.chars().find(|c| c.is_control() || FORBIDDEN_CHARS.contains(c)) {
        return Err(FsError::new(
            ErrorCode::InvalidArgument,
            format!("path contains invalid character {:?}", c),
        )
        .with_path(path));
    }

    Ok(())
}

fn check_key_length(path: &str, key: &str) -> FsResult<()> {
    if key.len() > MAX_KEY_LENGTH {
        return Err(FsError::new(
            ErrorCode::NameTooLong,
            format!("object key is {} bytes, limit is {}", key.len(), MAX_KEY_LENGTH),
        )
        .with_path(path));
    }
    Ok(())
}

/// Maps filesystem paths onto object locations for one addressing mode.
///
/// In bucket-in-path mode the first path segment names the bucket. When bound
/// to a bucket, every path is relative to it; a leading segment equal to the
/// bound bucket is tolerated and stripped. An optional prefix is prepended to
/// every key, joined with the key separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConverter {
    bucket: Option<String>,
    prefix: String,
    separator: char,
}

impl Default for PathConverter {
    fn default() -> Self {
        Self::bucket_in_path()
    }
}

impl PathConverter {
    pub fn bucket_in_path() -> Self {
        Self { bucket: None, prefix: String::new(), separator: SEPARATOR }
    }

    pub fn bound(bucket: impl Into<String>) -> Self {
        Self { bucket: Some(bucket.into()), ..Self::bucket_in_path() }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        let converter = match config.bucket.as_deref().filter(|b| !b.is_empty()) {
            Some(bucket) => Self::bound(bucket),
            None => Self::bucket_in_path(),
        };
        converter
            .with_prefix(config.prefix.clone().unwrap_or_default())
            .with_separator(config.separator)
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Bucket and bucket-relative path (no leading or trailing slash)
    fn relative_parts(&self, path: &str) -> (String, String) {
        let Some(bound) = self.bucket.as_deref() else {
            let location = split_path(path);
            return (location.bucket, location.key);
        };

        let normalized = normalize_path(path);
        let relative = &normalized[1..];
        let relative = match relative.strip_prefix(bound) {
            Some("") => "",
            Some(rest) if rest.starts_with(SEPARATOR) => &rest[1..],
            _ => relative,
        };
        (bound.to_string(), relative.to_string())
    }

    fn apply_prefix(&self, relative: &str) -> String {
        let sep = self.separator;
        let segments: Vec<&str> = self
            .prefix
            .split(sep)
            .chain(relative.split(SEPARATOR))
            .filter(|segment| !segment.is_empty())
            .collect();
        segments.join(&sep.to_string())
    }

    /// Object location of the file at `path`
    pub fn path_to_object_key(&self, path: &str) -> ObjectLocation {
        let (bucket, relative) = self.relative_parts(path);
        ObjectLocation { bucket, key: self.apply_prefix(&relative) }
    }

    /// Key of the zero-byte object marking `path` as a directory
    pub fn directory_marker(&self, path: &str) -> ObjectLocation {
        self.list_prefix(path)
    }

    /// Prefix whose delimiter listing yields the direct children of `path`
    pub fn list_prefix(&self, path: &str) -> ObjectLocation {
        let mut location = self.path_to_object_key(path);
        if !location.key.is_empty() {
            location.key.push(self.separator);
        }
        location
    }

    /// Whether `path` is the root of its bucket
    pub fn is_bucket_root(&self, path: &str) -> bool {
        self.relative_parts(path).1.is_empty()
    }

    /// [`validate_path`] with the key length measured in this converter's
    /// addressing mode, prefix included
    pub fn validate(&self, path: &str) -> FsResult<()> {
        check_characters(path)?;
        check_key_length(path, &self.path_to_object_key(path).key)
    }

    /// [`validate`](Self::validate) for a path about to get a directory
    /// marker; the marker's trailing separator counts toward the limit
    pub fn validate_directory(&self, path: &str) -> FsResult<()> {
        check_characters(path)?;
        check_key_length(path, &self.directory_marker(path).key)
    }

    /// Turn a raw listing key or common prefix under `list_prefix` into a
    /// child entry. Returns `None` for the directory's own marker.
    pub fn child_entry(&self, list_prefix: &str, raw: &str) -> Option<DirEntry> {
        let rest = raw.strip_prefix(list_prefix).unwrap_or(raw);
        let (name, file_type) = match rest.split_once(self.separator) {
            Some((name, _)) => (name, FileType::Directory),
            None => (rest, FileType::File),
        };
        if name.is_empty() {
            return None;
        }
        Some(DirEntry::new(name, file_type))
    }
}
