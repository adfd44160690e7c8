// In-process object store
//
// Implements the S3 semantics the filesystem layer relies on: flat keys,
// delimiter listings rolled up into common prefixes, and S3-style error codes.
// Intended for tests and for embedding without a server.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::stream::{ByteStream, Data, stream_to_buffer, to_readable_stream};

use super::error::{BackendError, codes};
use super::models::{CopyConditions, CopySource, ListEntry, ObjectStat};
use super::traits::ObjectStoreClient;

const DEFAULT_DELIMITER: char = '/';

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
    etag: String,
}

impl StoredObject {
    fn new(data: Bytes) -> Self {
        let etag = format!("{:x}", Sha256::digest(&data));
        Self { data, last_modified: Utc::now(), etag }
    }

    fn stat(&self) -> ObjectStat {
        ObjectStat {
            size: self.data.len() as u64,
            last_modified: self.last_modified,
            etag: self.etag.clone(),
        }
    }
}

type Buckets = HashMap<String, BTreeMap<String, StoredObject>>;

#[derive(Debug)]
pub struct MemoryObjectStore {
    buckets: RwLock<Buckets>,
    delimiter: char,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self { buckets: RwLock::new(HashMap::new()), delimiter: DEFAULT_DELIMITER }
    }

    /// Store with `bucket` already created
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        if let Ok(mut buckets) = store.buckets.write() {
            buckets.insert(bucket.to_string(), BTreeMap::new());
        }
        store
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// All keys stored in `bucket`, in order
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .ok()
            .and_then(|buckets| buckets.get(bucket).map(|objects| objects.keys().cloned().collect()))
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Buckets>> {
        self.buckets.read().map_err(|_| anyhow!("object store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Buckets>> {
        self.buckets.write().map_err(|_| anyhow!("object store lock poisoned"))
    }

    fn object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let buckets = self.read()?;
        let objects = buckets.get(bucket).ok_or_else(|| BackendError::no_such_bucket(bucket))?;
        let object = objects.get(key).ok_or_else(|| BackendError::no_such_key(bucket, key))?;
        Ok(object.clone())
    }

    fn insert(&self, bucket: &str, key: &str, object: StoredObject) -> Result<()> {
        let mut buckets = self.write()?;
        let objects = buckets.get_mut(bucket).ok_or_else(|| BackendError::no_such_bucket(bucket))?;
        objects.insert(key.to_string(), object);
        Ok(())
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        if bucket.is_empty() {
            return Err(BackendError::new(codes::INVALID_BUCKET_NAME, "Bucket name is empty").into());
        }

        let mut buckets = self.write()?;
        if buckets.contains_key(bucket) {
            return Err(BackendError::new(
                codes::BUCKET_ALREADY_OWNED_BY_YOU,
                format!("Your previous request to create the named bucket succeeded: {}", bucket),
            )
            .into());
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        tracing::debug!(bucket, "Created in-memory bucket");
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        let object = self.object(bucket, key)?;
        Ok(to_readable_stream(Data::Buffer(object.data)))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        size: Option<u64>,
    ) -> Result<()> {
        if !self.bucket_exists(bucket).await? {
            return Err(BackendError::no_such_bucket(bucket).into());
        }

        let data = stream_to_buffer(body).await?;
        if let Some(expected) = size {
            if data.len() as u64 != expected {
                return Err(BackendError::new(
                    codes::INCOMPLETE_BODY,
                    format!("Declared {} bytes but received {}", expected, data.len()),
                )
                .into());
            }
        }

        tracing::trace!(bucket, key, size = data.len(), "Stored in-memory object");
        self.insert(bucket, key, StoredObject::new(data))
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectStat> {
        Ok(self.object(bucket, key)?.stat())
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut buckets = self.write()?;
        let objects = buckets.get_mut(bucket).ok_or_else(|| BackendError::no_such_bucket(bucket))?;
        objects.remove(key);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<Vec<ListEntry>> {
        let buckets = self.read()?;
        let objects = buckets.get(bucket).ok_or_else(|| BackendError::no_such_bucket(bucket))?;

        let mut entries = Vec::new();
        let mut last_prefix: Option<String> = None;
        for (key, object) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };

            if !recursive {
                if let Some(index) = rest.find(self.delimiter) {
                    let common = format!("{}{}", prefix, &rest[..index + self.delimiter.len_utf8()]);
                    if last_prefix.as_deref() != Some(common.as_str()) {
                        entries.push(ListEntry::common_prefix(common.clone()));
                        last_prefix = Some(common);
                    }
                    continue;
                }
            }

            entries.push(ListEntry::object(key.clone(), object.data.len() as u64, object.last_modified));
        }

        Ok(entries)
    }

    async fn copy_object(
        &self,
        bucket: &str,
        key: &str,
        source: &CopySource,
        conditions: &CopyConditions,
    ) -> Result<()> {
        let original = self.object(&source.bucket, &source.key)?;
        if !conditions.is_satisfied_by(&original.stat()) {
            return Err(BackendError::new(
                codes::PRECONDITION_FAILED,
                format!("At least one of the preconditions you specified did not hold: {}", source),
            )
            .into());
        }

        self.insert(bucket, key, StoredObject::new(original.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn put(store: &MemoryObjectStore, bucket: &str, key: &str, data: &'static str) {
        store
            .put_object(bucket, key, to_readable_stream(Data::from(data)), Some(data.len() as u64))
            .await
            .unwrap();
    }

    fn backend_code(err: &anyhow::Error) -> Option<String> {
        err.downcast_ref::<BackendError>().and_then(|backend| backend.code.clone())
    }

    #[tokio::test]
    async fn test_make_bucket_twice_reports_already_owned() {
        let store = MemoryObjectStore::new();
        store.make_bucket("docs").await.unwrap();
        assert!(store.bucket_exists("docs").await.unwrap());

        let err = store.make_bucket("docs").await.unwrap_err();
        assert_eq!(backend_code(&err).as_deref(), Some(codes::BUCKET_ALREADY_OWNED_BY_YOU));
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = MemoryObjectStore::with_bucket("docs");
        put(&store, "docs", "a/b.txt", "hello").await;

        let body = store.get_object("docs", "a/b.txt").await.unwrap();
        assert_eq!(stream_to_buffer(body).await.unwrap(), Bytes::from("hello"));

        let stat = store.stat_object("docs", "a/b.txt").await.unwrap();
        assert_eq!(stat.size, 5);
        assert_eq!(stat.etag.len(), 64);
    }

    #[tokio::test]
    async fn test_missing_key_and_bucket_codes() {
        let store = MemoryObjectStore::with_bucket("docs");

        let err = store.stat_object("docs", "nope").await.unwrap_err();
        assert_eq!(backend_code(&err).as_deref(), Some(codes::NO_SUCH_KEY));

        let err = store.get_object("other", "nope").await.err().unwrap();
        assert_eq!(backend_code(&err).as_deref(), Some(codes::NO_SUCH_BUCKET));
    }

    #[tokio::test]
    async fn test_put_rejects_size_mismatch() {
        let store = MemoryObjectStore::with_bucket("docs");
        let err = store
            .put_object("docs", "k", to_readable_stream(Data::from("abc")), Some(10))
            .await
            .unwrap_err();
        assert_eq!(backend_code(&err).as_deref(), Some(codes::INCOMPLETE_BODY));
        assert!(store.keys("docs").is_empty());
    }

    #[tokio::test]
    async fn test_delimiter_listing_rolls_up_prefixes() {
        let store = MemoryObjectStore::with_bucket("docs");
        put(&store, "docs", "a/", "").await;
        put(&store, "docs", "a/b/", "").await;
        put(&store, "docs", "a/b/c.txt", "c").await;
        put(&store, "docs", "a/d.txt", "d").await;
        put(&store, "docs", "ab.txt", "x").await;

        let entries = store.list_objects("docs", "a/", false).await.unwrap();
        assert_eq!(
            entries,
            vec![
                ListEntry::object("a/", 0, entries[0].last_modified.unwrap()),
                ListEntry::common_prefix("a/b/"),
                ListEntry::object("a/d.txt", 1, entries[2].last_modified.unwrap()),
            ]
        );

        let recursive = store.list_objects("docs", "a/", true).await.unwrap();
        let names: Vec<_> = recursive.iter().filter_map(|entry| entry.name.clone()).collect();
        assert_eq!(names, vec!["a/", "a/b/", "a/b/c.txt", "a/d.txt"]);
    }

    #[tokio::test]
    async fn test_custom_delimiter() {
        let store = MemoryObjectStore::with_bucket("docs").with_delimiter(':');
        put(&store, "docs", "a:b:c", "1").await;

        let entries = store.list_objects("docs", "a:", false).await.unwrap();
        assert_eq!(entries, vec![ListEntry::common_prefix("a:b:")]);
    }

    #[tokio::test]
    async fn test_remove_missing_object_is_not_an_error() {
        let store = MemoryObjectStore::with_bucket("docs");
        store.remove_object("docs", "never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_copy_object_and_preconditions() {
        let store = MemoryObjectStore::with_bucket("docs");
        put(&store, "docs", "src.txt", "payload").await;
        let source = CopySource::new("docs", "src.txt");

        store.copy_object("docs", "dst.txt", &source, &CopyConditions::default()).await.unwrap();
        let copied = stream_to_buffer(store.get_object("docs", "dst.txt").await.unwrap()).await;
        assert_eq!(copied.unwrap(), Bytes::from("payload"));

        let conditions = CopyConditions { match_etag: Some("bogus".into()), ..Default::default() };
        let err = store.copy_object("docs", "dst2.txt", &source, &conditions).await.unwrap_err();
        assert_eq!(backend_code(&err).as_deref(), Some(codes::PRECONDITION_FAILED));
    }
}
