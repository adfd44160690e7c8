use thiserror::Error;

/// S3 error identifiers returned in the `Code` element of error responses
pub mod codes {
    pub const NO_SUCH_KEY: &str = "NoSuchKey";
    pub const NO_SUCH_BUCKET: &str = "NoSuchBucket";
    pub const ACCESS_DENIED: &str = "AccessDenied";
    pub const BUCKET_ALREADY_OWNED_BY_YOU: &str = "BucketAlreadyOwnedByYou";
    pub const BUCKET_ALREADY_EXISTS: &str = "BucketAlreadyExists";
    pub const INVALID_BUCKET_NAME: &str = "InvalidBucketName";
    pub const KEY_TOO_LONG: &str = "KeyTooLongError";
    pub const PRECONDITION_FAILED: &str = "PreconditionFailed";
    pub const INCOMPLETE_BODY: &str = "IncompleteBody";
}

/// Error reported by an object storage backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    /// Backend error identifier, e.g. `NoSuchKey`
    pub code: Option<String>,
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: Some(code.into()), message: message.into() }
    }

    /// An error with no identifier; classified by its message only
    pub fn untyped(message: impl Into<String>) -> Self {
        Self { code: None, message: message.into() }
    }

    pub fn no_such_bucket(bucket: &str) -> Self {
        Self::new(codes::NO_SUCH_BUCKET, format!("The specified bucket does not exist: {}", bucket))
    }

    pub fn no_such_key(bucket: &str, key: &str) -> Self {
        Self::new(codes::NO_SUCH_KEY, format!("The specified key does not exist: {}/{}", bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display_is_message() {
        let err = BackendError::new(codes::ACCESS_DENIED, "Access Denied.");
        assert_eq!(err.to_string(), "Access Denied.");
        assert_eq!(err.code.as_deref(), Some("AccessDenied"));
    }

    #[test]
    fn test_untyped_has_no_code() {
        assert!(BackendError::untyped("socket hang up").code.is_none());
    }

    #[test]
    fn test_no_such_key_mentions_location() {
        let err = BackendError::no_such_key("photos", "2024/cat.png");
        assert_eq!(err.code.as_deref(), Some(codes::NO_SUCH_KEY));
        assert!(err.message.contains("photos/2024/cat.png"));
    }
}
