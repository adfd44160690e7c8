// Filesystem-style errors and backend error translation
//
// Every failure leaving the facade is an FsError carrying a stable code
// string (ENOENT, EACCES, ...), a negative errno, the syscall and path that
// failed, and the original backend error as its source.

use std::fmt;
use std::io;

use crate::storage::BackendError;

pub type FsResult<T> = Result<T, FsError>;

/// Errno values reported on every target, in Linux numbering
mod errno {
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const EACCES: i32 = 13;
    pub const EEXIST: i32 = 17;
    pub const EISDIR: i32 = 21;
    pub const EINVAL: i32 = 22;
    pub const ENAMETOOLONG: i32 = 36;
    pub const ENOTEMPTY: i32 = 39;
    pub const ETIMEDOUT: i32 = 110;
    pub const ECONNREFUSED: i32 = 111;
    /// Node-style code for a failed DNS lookup (`UV_EAI_NONAME`); POSIX has none
    pub const ENOTFOUND: i32 = 3008;
}

/// Filesystem error codes surfaced to callers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// ENOENT
    NotFound,
    /// EACCES
    AccessDenied,
    /// EEXIST
    AlreadyExists,
    /// EINVAL
    InvalidArgument,
    /// EISDIR
    IsDirectory,
    /// ENAMETOOLONG
    NameTooLong,
    /// ENOTEMPTY
    NotEmpty,
    /// EIO
    Io,
    /// ENOTFOUND
    HostNotFound,
    /// ECONNREFUSED
    ConnectionRefused,
    /// ETIMEDOUT
    TimedOut,
    /// Unrecognized code, reported with EIO's errno and description
    Other(String),
}

impl ErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "ENOENT" => ErrorCode::NotFound,
            "EACCES" => ErrorCode::AccessDenied,
            "EEXIST" => ErrorCode::AlreadyExists,
            "EINVAL" => ErrorCode::InvalidArgument,
            "EISDIR" => ErrorCode::IsDirectory,
            "ENAMETOOLONG" => ErrorCode::NameTooLong,
            "ENOTEMPTY" => ErrorCode::NotEmpty,
            "EIO" => ErrorCode::Io,
            "ENOTFOUND" => ErrorCode::HostNotFound,
            "ECONNREFUSED" => ErrorCode::ConnectionRefused,
            "ETIMEDOUT" => ErrorCode::TimedOut,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::NotFound => "ENOENT",
            ErrorCode::AccessDenied => "EACCES",
            ErrorCode::AlreadyExists => "EEXIST",
            ErrorCode::InvalidArgument => "EINVAL",
            ErrorCode::IsDirectory => "EISDIR",
            ErrorCode::NameTooLong => "ENAMETOOLONG",
            ErrorCode::NotEmpty => "ENOTEMPTY",
            ErrorCode::Io => "EIO",
            ErrorCode::HostNotFound => "ENOTFOUND",
            ErrorCode::ConnectionRefused => "ECONNREFUSED",
            ErrorCode::TimedOut => "ETIMEDOUT",
            ErrorCode::Other(code) => code,
        }
    }

    /// Negative errno, Node.js convention. The numbering is the same on
    /// every platform.
    pub fn errno(&self) -> i32 {
        let value = match self {
            ErrorCode::NotFound => errno::ENOENT,
            ErrorCode::AccessDenied => errno::EACCES,
            ErrorCode::AlreadyExists => errno::EEXIST,
            ErrorCode::InvalidArgument => errno::EINVAL,
            ErrorCode::IsDirectory => errno::EISDIR,
            ErrorCode::NameTooLong => errno::ENAMETOOLONG,
            ErrorCode::NotEmpty => errno::ENOTEMPTY,
            ErrorCode::HostNotFound => errno::ENOTFOUND,
            ErrorCode::ConnectionRefused => errno::ECONNREFUSED,
            ErrorCode::TimedOut => errno::ETIMEDOUT,
            ErrorCode::Io | ErrorCode::Other(_) => errno::EIO,
        };
        -value
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "no such file or directory",
            ErrorCode::AccessDenied => "permission denied",
            ErrorCode::AlreadyExists => "file already exists",
            ErrorCode::InvalidArgument => "invalid argument",
            ErrorCode::IsDirectory => "illegal operation on a directory",
            ErrorCode::NameTooLong => "name too long",
            ErrorCode::NotEmpty => "directory not empty",
            ErrorCode::HostNotFound => "host not found",
            ErrorCode::ConnectionRefused => "connection refused",
            ErrorCode::TimedOut => "connection timed out",
            ErrorCode::Io | ErrorCode::Other(_) => "i/o error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        ErrorCode::parse(code)
    }
}

/// Filesystem-style error record
///
/// Displays as `"<CODE>: <description>, <syscall> '<path>'"`.
#[derive(Debug)]
pub struct FsError {
    pub code: ErrorCode,
    pub errno: i32,
    pub path: Option<String>,
    pub syscall: Option<String>,
    pub description: String,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FsError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        let errno = code.errno();
        Self { code, errno, path: None, syscall: None, description: description.into(), cause: None }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_syscall(mut self, syscall: impl Into<String>) -> Self {
        self.syscall = Some(syscall.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)?;
        if let Some(syscall) = &self.syscall {
            write!(f, ", {}", syscall)?;
        }
        if let Some(path) = &self.path {
            write!(f, " '{}'", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        let kind = match err.code {
            ErrorCode::NotFound => io::ErrorKind::NotFound,
            ErrorCode::AccessDenied => io::ErrorKind::PermissionDenied,
            ErrorCode::AlreadyExists => io::ErrorKind::AlreadyExists,
            ErrorCode::IsDirectory => io::ErrorKind::IsADirectory,
            ErrorCode::InvalidArgument | ErrorCode::NameTooLong => io::ErrorKind::InvalidInput,
            ErrorCode::NotEmpty => io::ErrorKind::DirectoryNotEmpty,
            ErrorCode::ConnectionRefused => io::ErrorKind::ConnectionRefused,
            ErrorCode::TimedOut => io::ErrorKind::TimedOut,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// S3 error identifiers and the code each one translates to
static BACKEND_CODES: &[(&str, ErrorCode)] = &[
    ("NoSuchKey", ErrorCode::NotFound),
    ("NoSuchBucket", ErrorCode::NotFound),
    ("NotFound", ErrorCode::NotFound),
    ("AccessDenied", ErrorCode::AccessDenied),
    ("InvalidAccessKeyId", ErrorCode::AccessDenied),
    ("SignatureDoesNotMatch", ErrorCode::AccessDenied),
    ("KeyTooLongError", ErrorCode::NameTooLong),
    ("BucketAlreadyExists", ErrorCode::AlreadyExists),
    ("BucketAlreadyOwnedByYou", ErrorCode::AlreadyExists),
    ("InvalidBucketName", ErrorCode::InvalidArgument),
    ("InvalidObjectName", ErrorCode::InvalidArgument),
    ("InvalidArgument", ErrorCode::InvalidArgument),
    ("ENOTFOUND", ErrorCode::HostNotFound),
    ("ECONNREFUSED", ErrorCode::ConnectionRefused),
    ("ETIMEDOUT", ErrorCode::TimedOut),
];

/// Lowercase message fragments, checked in order
static MESSAGE_PATTERNS: &[(&str, ErrorCode)] = &[
    ("enotfound", ErrorCode::HostNotFound),
    ("getaddrinfo", ErrorCode::HostNotFound),
    ("econnrefused", ErrorCode::ConnectionRefused),
    ("connection refused", ErrorCode::ConnectionRefused),
    ("etimedout", ErrorCode::TimedOut),
    ("timed out", ErrorCode::TimedOut),
    ("timeout", ErrorCode::TimedOut),
    ("not found", ErrorCode::NotFound),
    ("does not exist", ErrorCode::NotFound),
    ("no such", ErrorCode::NotFound),
    ("access denied", ErrorCode::AccessDenied),
    ("permission denied", ErrorCode::AccessDenied),
    ("forbidden", ErrorCode::AccessDenied),
    ("already exists", ErrorCode::AlreadyExists),
    ("already owned", ErrorCode::AlreadyExists),
    ("too long", ErrorCode::NameTooLong),
    ("invalid", ErrorCode::InvalidArgument),
];

fn code_for_identifier(identifier: &str) -> Option<ErrorCode> {
    BACKEND_CODES.iter().find(|(known, _)| *known == identifier).map(|(_, code)| code.clone())
}

fn code_for_message(message: &str) -> Option<ErrorCode> {
    let message = message.to_lowercase();
    MESSAGE_PATTERNS
        .iter()
        .find(|(pattern, _)| message.contains(pattern))
        .map(|(_, code)| code.clone())
}

fn code_for_io_kind(kind: io::ErrorKind) -> Option<ErrorCode> {
    match kind {
        io::ErrorKind::NotFound => Some(ErrorCode::NotFound),
        io::ErrorKind::PermissionDenied => Some(ErrorCode::AccessDenied),
        io::ErrorKind::AlreadyExists => Some(ErrorCode::AlreadyExists),
        io::ErrorKind::InvalidInput => Some(ErrorCode::InvalidArgument),
        io::ErrorKind::IsADirectory => Some(ErrorCode::IsDirectory),
        io::ErrorKind::DirectoryNotEmpty => Some(ErrorCode::NotEmpty),
        io::ErrorKind::ConnectionRefused => Some(ErrorCode::ConnectionRefused),
        io::ErrorKind::TimedOut => Some(ErrorCode::TimedOut),
        _ => None,
    }
}

fn translated(
    code: ErrorCode,
    message: String,
    path: Option<&str>,
    syscall: &str,
    cause: Box<dyn std::error::Error + Send + Sync>,
) -> FsError {
    let description = if message.is_empty() { code.description().to_string() } else { message };
    let mut err = FsError::new(code, description).with_syscall(syscall).with_cause(cause);
    err.path = path.map(str::to_string);
    err
}

/// Translate a backend failure into an FsError
///
/// Errors that already are FsErrors (directly, or inside an `io::Error`) pass
/// through untouched. Otherwise the S3 error code or I/O error kind decides,
/// then the message text, then EIO.
pub fn convert_error(err: anyhow::Error, path: Option<&str>, syscall: &str) -> FsError {
    let err = match err.downcast::<FsError>() {
        Ok(fs_err) => return fs_err,
        Err(err) => err,
    };

    let err = match err.downcast::<io::Error>() {
        Ok(io_err) => return convert_io_error(io_err, path, syscall),
        Err(err) => err,
    };

    let message = format!("{:#}", err);
    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<BackendError>())
        .and_then(|backend| backend.code.as_deref())
        .and_then(code_for_identifier)
        .or_else(|| code_for_message(&message))
        .unwrap_or(ErrorCode::Io);

    translated(code, message, path, syscall, err.into())
}

fn convert_io_error(err: io::Error, path: Option<&str>, syscall: &str) -> FsError {
    let err = match err.downcast::<FsError>() {
        Ok(fs_err) => return fs_err,
        Err(err) => err,
    };

    let message = err.to_string();
    let code = code_for_io_kind(err.kind())
        .or_else(|| code_for_message(&message))
        .unwrap_or(ErrorCode::Io);

    translated(code, message, path, syscall, Box::new(err))
}

/// Build an FsError for a condition detected without a backend round-trip
pub fn create_error(code: impl Into<ErrorCode>, path: Option<&str>, syscall: &str) -> FsError {
    let code = code.into();
    let description = code.description();
    let mut err = FsError::new(code, description).with_syscall(syscall);
    err.path = path.map(str::to_string);
    err
}

pub fn is_not_found_error(err: &FsError) -> bool {
    err.code == ErrorCode::NotFound
}

pub fn is_access_denied_error(err: &FsError) -> bool {
    err.code == ErrorCode::AccessDenied
}

pub fn is_exists_error(err: &FsError) -> bool {
    err.code == ErrorCode::AlreadyExists
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn backend(code: &str, message: &str) -> anyhow::Error {
        BackendError::new(code, message).into()
    }

    #[test]
    fn test_errno_values() {
        assert_eq!(ErrorCode::NotFound.errno(), -2);
        assert_eq!(ErrorCode::Io.errno(), -5);
        assert_eq!(ErrorCode::AccessDenied.errno(), -13);
        assert_eq!(ErrorCode::AlreadyExists.errno(), -17);
        assert_eq!(ErrorCode::InvalidArgument.errno(), -22);
        assert_eq!(ErrorCode::NameTooLong.errno(), -36);
        assert_eq!(ErrorCode::NotEmpty.errno(), -39);
        assert_eq!(ErrorCode::IsDirectory.errno(), -21);
        assert_eq!(ErrorCode::TimedOut.errno(), -110);
        assert_eq!(ErrorCode::ConnectionRefused.errno(), -111);
        assert_eq!(ErrorCode::HostNotFound.errno(), -3008);
    }

    #[test]
    fn test_error_code_parse_round_trip() {
        for code in ["ENOENT", "EACCES", "EEXIST", "EINVAL", "EISDIR", "ENAMETOOLONG", "ENOTEMPTY", "EIO"] {
            assert_eq!(ErrorCode::parse(code).as_str(), code);
        }
        assert_eq!(ErrorCode::parse("EWHATEVER"), ErrorCode::Other("EWHATEVER".to_string()));
    }

    #[test]
    fn test_convert_no_such_key() {
        let err = convert_error(
            backend("NoSuchKey", "The specified key does not exist."),
            Some("/bucket/missing.txt"),
            "open",
        );
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.errno, -2);
        assert_eq!(err.path.as_deref(), Some("/bucket/missing.txt"));
        assert_eq!(err.syscall.as_deref(), Some("open"));
        assert_eq!(
            err.to_string(),
            "ENOENT: The specified key does not exist., open '/bucket/missing.txt'"
        );
    }

    #[test]
    fn test_convert_access_denied() {
        let err = convert_error(backend("AccessDenied", "Access Denied."), Some("/b/k"), "stat");
        assert_eq!(err.code, ErrorCode::AccessDenied);
        assert_eq!(err.errno, -13);
        assert!(is_access_denied_error(&err));
    }

    #[test]
    fn test_convert_bucket_already_owned() {
        let err = convert_error(
            backend("BucketAlreadyOwnedByYou", "Your previous request succeeded"),
            Some("/b"),
            "mkdir",
        );
        assert!(is_exists_error(&err));
    }

    #[test]
    fn test_convert_unknown_keeps_message() {
        let err = convert_error(backend("SlowDown", "Please reduce your request rate"), None, "open");
        assert_eq!(err.code, ErrorCode::Io);
        assert_eq!(err.errno, -5);
        assert!(err.to_string().contains("Please reduce your request rate"));
        assert!(err.path.is_none());
        assert_eq!(err.to_string(), "EIO: Please reduce your request rate, open");
    }

    #[test]
    fn test_convert_by_message_when_code_missing() {
        let err = convert_error(anyhow::anyhow!("object not found in bucket"), Some("/b/x"), "stat");
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = convert_error(anyhow::anyhow!("getaddrinfo ENOTFOUND minio.local"), None, "open");
        assert_eq!(err.code, ErrorCode::HostNotFound);
        assert_eq!(err.errno, -3008);
    }

    #[test]
    fn test_convert_unrecognized_code_falls_back_to_message() {
        let err = convert_error(backend("Weird", "key name too long for bucket"), Some("/b/k"), "open");
        assert_eq!(err.code, ErrorCode::NameTooLong);
    }

    #[test]
    fn test_convert_io_error_kind() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connect failed");
        let err = convert_error(io_err.into(), Some("/b/k"), "open");
        assert_eq!(err.code, ErrorCode::ConnectionRefused);
        assert_eq!(err.errno, -111);

        let io_err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(convert_error(io_err.into(), None, "open").code, ErrorCode::TimedOut);
    }

    #[test]
    fn test_convert_passes_fs_error_through() {
        let original = create_error("ENOTEMPTY", Some("/b/dir"), "rmdir");
        let converted = convert_error(original.into(), Some("/other"), "open");
        assert_eq!(converted.code, ErrorCode::NotEmpty);
        assert_eq!(converted.path.as_deref(), Some("/b/dir"));
        assert_eq!(converted.syscall.as_deref(), Some("rmdir"));
    }

    #[test]
    fn test_convert_passes_fs_error_inside_io_error_through() {
        let io_err: io::Error = create_error("EACCES", Some("/b/k"), "open").into();
        assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);

        let converted = convert_error(io_err.into(), Some("/b/k"), "read");
        assert_eq!(converted.code, ErrorCode::AccessDenied);
        assert_eq!(converted.syscall.as_deref(), Some("open"));
    }

    #[test]
    fn test_convert_keeps_cause() {
        let err = convert_error(backend("NoSuchBucket", "bucket is gone"), Some("/gone/x"), "open");
        let source = err.source().expect("cause retained");
        assert_eq!(source.to_string(), "bucket is gone");
    }

    #[test]
    fn test_convert_finds_backend_error_under_context() {
        let err = anyhow::Error::from(BackendError::new("AccessDenied", "denied"))
            .context("listing objects");
        assert_eq!(convert_error(err, None, "scandir").code, ErrorCode::AccessDenied);
    }

    #[test]
    fn test_create_error_known_code() {
        let err = create_error(ErrorCode::NotEmpty, Some("/bucket/dir"), "rmdir");
        assert_eq!(err.to_string(), "ENOTEMPTY: directory not empty, rmdir '/bucket/dir'");
        assert!(err.cause.is_none());
    }

    #[test]
    fn test_create_error_unknown_code_keeps_code_string() {
        let err = create_error("EBUSY", Some("/b"), "rmdir");
        assert_eq!(err.code.as_str(), "EBUSY");
        assert_eq!(err.errno, -5);
        assert_eq!(err.description, "i/o error");
    }

    #[test]
    fn test_create_error_without_path() {
        let err = create_error("EEXIST", None, "mkdir");
        assert_eq!(err.to_string(), "EEXIST: file already exists, mkdir");
    }

    #[test]
    fn test_predicates_check_code_only() {
        let mut err = create_error("ENOENT", Some("/x"), "stat");
        assert!(is_not_found_error(&err));
        assert!(!is_access_denied_error(&err));
        assert!(!is_exists_error(&err));

        err.errno = 0;
        assert!(is_not_found_error(&err));
    }

    #[test]
    fn test_fs_error_into_io_error_kinds() {
        let cases = vec![
            ("ENOENT", io::ErrorKind::NotFound),
            ("EEXIST", io::ErrorKind::AlreadyExists),
            ("ENOTEMPTY", io::ErrorKind::DirectoryNotEmpty),
            ("ENAMETOOLONG", io::ErrorKind::InvalidInput),
            ("EIO", io::ErrorKind::Other),
        ];

        for (code, kind) in cases {
            let io_err: io::Error = create_error(code, None, "open").into();
            assert_eq!(io_err.kind(), kind, "{}", code);
        }
    }
}
