use anyhow::Result;
use async_trait::async_trait;
#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

use crate::stream::ByteStream;

use super::models::{CopyConditions, CopySource, ListEntry, ObjectStat};

/// S3-compatible object storage client
///
/// Failures are reported as `anyhow::Error`. Clients should surface S3 error
/// responses as [`BackendError`](super::BackendError) values (possibly under
/// added context) and transport failures as `std::io::Error`, so the
/// filesystem layer can classify them.
#[cfg_attr(any(test, feature = "mockall"), automock)]
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;
    async fn make_bucket(&self, bucket: &str) -> Result<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream>;
    /// `size` is `None` when the content length is not known up front.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        size: Option<u64>,
    ) -> Result<()>;
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectStat>;
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Lists keys under `prefix`. Unless `recursive`, keys containing the
    /// delimiter past the prefix are rolled up into common prefixes.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<Vec<ListEntry>>;

    async fn copy_object(
        &self,
        bucket: &str,
        key: &str,
        source: &CopySource,
        conditions: &CopyConditions,
    ) -> Result<()>;
}
