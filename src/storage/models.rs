use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Object metadata returned by `stat_object`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStat {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: String,
}

/// One entry of a delimiter listing: either an object (`name`) or a common
/// prefix (`prefix`, ends with the delimiter).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ListEntry {
    pub fn object(name: impl Into<String>, size: u64, last_modified: DateTime<Utc>) -> Self {
        Self { name: Some(name.into()), prefix: None, size, last_modified: Some(last_modified) }
    }

    pub fn common_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()), ..Default::default() }
    }
}

/// Source object of a server-side copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    pub bucket: String,
    pub key: String,
}

impl CopySource {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), key: key.into() }
    }
}

impl fmt::Display for CopySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.bucket, self.key)
    }
}

/// Preconditions evaluated against the source object of a copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyConditions {
    pub match_etag: Option<String>,
    pub not_match_etag: Option<String>,
    pub modified_since: Option<DateTime<Utc>>,
    pub unmodified_since: Option<DateTime<Utc>>,
}

impl CopyConditions {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn is_satisfied_by(&self, source: &ObjectStat) -> bool {
        if self.match_etag.as_ref().is_some_and(|etag| etag != &source.etag) {
            return false;
        }
        if self.not_match_etag.as_ref().is_some_and(|etag| etag == &source.etag) {
            return false;
        }
        if self.modified_since.is_some_and(|since| source.last_modified <= since) {
            return false;
        }
        if self.unmodified_since.is_some_and(|since| source.last_modified > since) {
            return false;
        }
        true
    }
}
