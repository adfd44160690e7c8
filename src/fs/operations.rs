use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::io;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{OnceCell, oneshot};
use tokio_stream::StreamExt;

use crate::config::StorageConfig;
use crate::fs::error::{
    ErrorCode, FsError, FsResult, convert_error, create_error, is_exists_error, is_not_found_error,
};
use crate::fs::path::{ObjectLocation, PathConverter, is_directory, normalize_path, parent_path, split_path};
use crate::fs::stat::{DirEntry, FileType, Stats};
use crate::fs::write_stream::WriteStream;
use crate::metrics::FsMetrics;
use crate::storage::{CopyConditions, CopySource, ListEntry, ObjectStoreClient};
use crate::stream::{
    ByteStream, Data, Encoding, create_pass_through_stream, decode_bytes, encode_text,
    get_data_size, normalize_data, stream_to_buffer, to_readable_stream,
};

const OPEN: &str = "open";
const ACCESS: &str = "access";
const STAT: &str = "stat";
const UNLINK: &str = "unlink";
const COPYFILE: &str = "copyfile";
const SCANDIR: &str = "scandir";
const MKDIR: &str = "mkdir";
const RMDIR: &str = "rmdir";

fn translate<'a>(path: &'a str, syscall: &'a str) -> impl FnOnce(anyhow::Error) -> FsError + 'a {
    move |err| convert_error(err, Some(path), syscall)
}

fn translate_io<'a>(path: &'a str, syscall: &'a str) -> impl FnOnce(io::Error) -> FsError + 'a {
    move |err| convert_error(err.into(), Some(path), syscall)
}

/// Filesystem-style access to S3-compatible object storage
///
/// Paths are mapped to objects by the [`PathConverter`]. Directories are
/// simulated: a directory exists when its zero-byte marker object or any
/// object below it exists. Target buckets are created on first use unless
/// bucket creation is disabled.
pub struct FileSystem {
    client: Arc<dyn ObjectStoreClient>,
    converter: PathConverter,
    create_bucket: bool,
    bound_bucket_ready: OnceCell<()>,
    ready_buckets: RwLock<HashSet<String>>,
    metrics: Option<Arc<FsMetrics>>,
}

impl FileSystem {
    pub fn new(client: Arc<dyn ObjectStoreClient>, converter: PathConverter) -> Self {
        Self {
            client,
            converter,
            create_bucket: true,
            bound_bucket_ready: OnceCell::new(),
            ready_buckets: RwLock::new(HashSet::new()),
            metrics: None,
        }
    }

    pub fn from_config(client: Arc<dyn ObjectStoreClient>, config: &StorageConfig) -> Self {
        Self::new(client, PathConverter::from_config(config)).with_bucket_creation(config.create_bucket)
    }

    pub fn with_bucket_creation(mut self, create_bucket: bool) -> Self {
        self.create_bucket = create_bucket;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<FsMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn converter(&self) -> &PathConverter {
        &self.converter
    }

    async fn instrumented<T>(
        &self,
        operation: &'static str,
        path: &str,
        future: impl Future<Output = FsResult<T>>,
    ) -> FsResult<T> {
        let started = Instant::now();
        let result = future.await;

        let code = result.as_ref().err().map(|err| err.code.to_string());
        if let Some(metrics) = &self.metrics {
            metrics.record_operation(operation, started.elapsed().as_secs_f64(), code.as_deref());
        }
        if let Err(err) = &result {
            tracing::debug!(operation, path, code = ?code, "Operation failed: {}", err);
        }
        result
    }

    fn is_namespace_root(&self, path: &str) -> bool {
        self.converter.bucket().is_none() && split_path(path).bucket.is_empty()
    }

    /// Validate `path`, map it, and make sure its bucket is ready
    async fn locate(&self, path: &str, syscall: &str) -> FsResult<ObjectLocation> {
        self.converter.validate(path).map_err(|err| err.with_syscall(syscall))?;

        let location = self.converter.path_to_object_key(path);
        if location.bucket.is_empty() {
            return Err(FsError::new(ErrorCode::InvalidArgument, "path does not name a bucket")
                .with_path(path)
                .with_syscall(syscall));
        }

        self.ensure_bucket(&location.bucket, path, syscall).await?;
        Ok(location)
    }

    /// [`locate`](Self::locate) for operations on a single object. A
    /// trailing slash names a directory, never an object.
    async fn locate_object(&self, path: &str, syscall: &str) -> FsResult<ObjectLocation> {
        let location = self.locate(path, syscall).await?;
        if self.converter.is_bucket_root(path) {
            return Err(create_error(ErrorCode::InvalidArgument, Some(path), syscall));
        }
        if is_directory(path) {
            return Err(create_error(ErrorCode::IsDirectory, Some(path), syscall));
        }
        Ok(location)
    }

    /// [`locate_object`](Self::locate_object) for operations that create the
    /// object; fails with EISDIR when a directory already occupies `path`
    async fn locate_new_object(&self, path: &str, syscall: &str) -> FsResult<ObjectLocation> {
        let location = self.locate_object(path, syscall).await?;
        if self.directory_found(path, syscall).await? {
            return Err(create_error(ErrorCode::IsDirectory, Some(path), syscall));
        }
        Ok(location)
    }

    async fn ensure_bucket(&self, bucket: &str, path: &str, syscall: &str) -> FsResult<()> {
        if !self.create_bucket {
            return Ok(());
        }

        if self.converter.bucket().is_some() {
            self.bound_bucket_ready
                .get_or_try_init(|| self.initialize_bucket(bucket, path, syscall))
                .await?;
            return Ok(());
        }

        let ready = self.ready_buckets.read().map(|ready| ready.contains(bucket)).unwrap_or(false);
        if ready {
            return Ok(());
        }

        self.initialize_bucket(bucket, path, syscall).await?;
        if let Ok(mut ready) = self.ready_buckets.write() {
            ready.insert(bucket.to_string());
        }
        Ok(())
    }

    async fn initialize_bucket(&self, bucket: &str, path: &str, syscall: &str) -> FsResult<()> {
        if self.client.bucket_exists(bucket).await.map_err(translate(path, syscall))? {
            return Ok(());
        }

        match self.client.make_bucket(bucket).await {
            Ok(()) => {
                tracing::info!(bucket, "Created bucket");
                Ok(())
            }
            Err(err) => {
                let err = convert_error(err, Some(path), syscall);
                if is_exists_error(&err) {
                    tracing::debug!(bucket, "Bucket was created concurrently");
                    return Ok(());
                }
                Err(err)
            }
        }
    }

    /// Direct children of the directory at `path`; the bucket must be ready
    async fn list_children(
        &self,
        path: &str,
        syscall: &str,
    ) -> FsResult<(ObjectLocation, Vec<ListEntry>)> {
        let prefix = self.converter.list_prefix(path);
        let entries = self
            .client
            .list_objects(&prefix.bucket, &prefix.key, false)
            .await
            .map_err(translate(path, syscall))?;
        Ok((prefix, entries))
    }

    async fn directory_exists(&self, path: &str, syscall: &str) -> FsResult<bool> {
        let (_, entries) = self.list_children(path, syscall).await?;
        Ok(!entries.is_empty())
    }

    /// [`directory_exists`](Self::directory_exists) with "not found" (a
    /// missing bucket) read as `false`
    async fn directory_found(&self, path: &str, syscall: &str) -> FsResult<bool> {
        match self.directory_exists(path, syscall).await {
            Err(err) if is_not_found_error(&err) => Ok(false),
            other => other,
        }
    }

    /// Whether a file object exists at `path`; the bucket must be ready
    async fn file_exists(&self, path: &str, syscall: &str) -> FsResult<bool> {
        let location = self.converter.path_to_object_key(path);
        match self.client.stat_object(&location.bucket, &location.key).await {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = convert_error(err, Some(path), syscall);
                if is_not_found_error(&err) {
                    return Ok(false);
                }
                Err(err)
            }
        }
    }

    async fn put_marker(&self, path: &str, syscall: &str) -> FsResult<()> {
        let marker = self.converter.directory_marker(path);
        let data = Data::Buffer(normalize_data(None).await.map_err(translate_io(path, syscall))?);
        let size = get_data_size(&data);
        self.client
            .put_object(&marker.bucket, &marker.key, to_readable_stream(data), size)
            .await
            .map_err(translate(path, syscall))?;
        tracing::debug!(bucket = %marker.bucket, key = %marker.key, "Created directory marker");
        Ok(())
    }

    /// Create the markers of `dir` and its missing ancestors, outermost first.
    /// Fails with EEXIST when one of them is a file.
    async fn create_ancestors(&self, dir: &str, syscall: &str) -> FsResult<()> {
        let mut missing = Vec::new();
        let mut current = normalize_path(dir);
        while !self.converter.is_bucket_root(&current)
            && !self.directory_exists(&current, syscall).await?
        {
            if self.file_exists(&current, syscall).await? {
                return Err(create_error(ErrorCode::AlreadyExists, Some(&current), syscall));
            }
            let parent = parent_path(&current);
            missing.push(current);
            current = parent;
        }

        for dir in missing.iter().rev() {
            self.put_marker(dir, syscall).await?;
        }
        Ok(())
    }

    pub async fn read_file(&self, path: &str) -> FsResult<Bytes> {
        self.instrumented("read_file", path, async {
            let location = self.locate_object(path, OPEN).await?;
            let body = self
                .client
                .get_object(&location.bucket, &location.key)
                .await
                .map_err(translate(path, OPEN))?;
            stream_to_buffer(body).await.map_err(translate_io(path, OPEN))
        })
        .await
    }

    pub async fn read_to_string(&self, path: &str, encoding: Encoding) -> FsResult<String> {
        let buffer = self.read_file(path).await?;
        Ok(decode_bytes(&buffer, encoding))
    }

    /// Write `data` to `path`, replacing any existing object. Text is encoded
    /// with `encoding`; other payloads are written as is.
    pub async fn write_file(
        &self,
        path: &str,
        data: impl Into<Data>,
        encoding: Encoding,
    ) -> FsResult<()> {
        let data = data.into();
        self.instrumented("write_file", path, async move {
            let location = self.locate_new_object(path, OPEN).await?;
            let data = match data {
                Data::Text(text) if encoding != Encoding::Utf8 => {
                    Data::Buffer(encode_text(&text, encoding).map_err(translate_io(path, OPEN))?)
                }
                other => other,
            };
            let size = get_data_size(&data);
            self.client
                .put_object(&location.bucket, &location.key, to_readable_stream(data), size)
                .await
                .map_err(translate(path, OPEN))
        })
        .await
    }

    /// Whether a file or directory exists at `path`. Only "not found" maps to
    /// `false`; any other failure is returned.
    pub async fn exists(&self, path: &str) -> FsResult<bool> {
        self.instrumented("exists", path, async {
            self.converter.validate(path).map_err(|err| err.with_syscall(ACCESS))?;
            if self.is_namespace_root(path) {
                return Ok(true);
            }

            self.locate(path, ACCESS).await?;
            if self.converter.is_bucket_root(path) {
                return Ok(true);
            }

            if !is_directory(path) && self.file_exists(path, ACCESS).await? {
                return Ok(true);
            }
            self.directory_found(path, ACCESS).await
        })
        .await
    }

    pub async fn stat(&self, path: &str) -> FsResult<Stats> {
        self.instrumented("stat", path, async {
            self.converter.validate(path).map_err(|err| err.with_syscall(STAT))?;
            if self.is_namespace_root(path) {
                return Ok(Stats::directory(DateTime::<Utc>::UNIX_EPOCH));
            }

            let location = self.locate(path, STAT).await?;
            if self.converter.is_bucket_root(path) {
                return Ok(Stats::directory(DateTime::<Utc>::UNIX_EPOCH));
            }

            if !is_directory(path) {
                match self.client.stat_object(&location.bucket, &location.key).await {
                    Ok(stat) => return Ok(Stats::file(&stat)),
                    Err(err) => {
                        let err = convert_error(err, Some(path), STAT);
                        if !is_not_found_error(&err) {
                            return Err(err);
                        }
                    }
                }
            }

            let (prefix, entries) = self.list_children(path, STAT).await?;
            if entries.is_empty() {
                return Err(create_error(ErrorCode::NotFound, Some(path), STAT));
            }

            let mtime = entries
                .iter()
                .find(|entry| entry.name.as_deref() == Some(prefix.key.as_str()))
                .and_then(|marker| marker.last_modified)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            Ok(Stats::directory(mtime))
        })
        .await
    }

    pub async fn unlink(&self, path: &str) -> FsResult<()> {
        self.instrumented("unlink", path, async {
            let location = self.locate_object(path, UNLINK).await?;
            self.client
                .stat_object(&location.bucket, &location.key)
                .await
                .map_err(translate(path, UNLINK))?;
            self.client
                .remove_object(&location.bucket, &location.key)
                .await
                .map_err(translate(path, UNLINK))
        })
        .await
    }

    /// Server-side copy of the object at `src` to `dest`. The source is
    /// checked first, so a failed copy is reported against `dest`.
    pub async fn copy_file(&self, src: &str, dest: &str) -> FsResult<()> {
        let paths = format!("{} -> {}", src, dest);
        self.instrumented("copy_file", &paths, async {
            let source = self.locate_object(src, COPYFILE).await?;
            self.client
                .stat_object(&source.bucket, &source.key)
                .await
                .map_err(translate(src, COPYFILE))?;

            let target = self.locate_new_object(dest, COPYFILE).await?;
            self.client
                .copy_object(
                    &target.bucket,
                    &target.key,
                    &CopySource::new(source.bucket, source.key),
                    &CopyConditions::default(),
                )
                .await
                .map_err(translate(dest, COPYFILE))
        })
        .await
    }

    pub async fn readdir(&self, path: &str) -> FsResult<Vec<String>> {
        let entries = self.readdir_with_file_types(path).await?;
        Ok(entries.into_iter().map(|entry| entry.name).collect())
    }

    /// Direct children of the directory at `path`, sorted by name
    pub async fn readdir_with_file_types(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        self.instrumented("readdir", path, async {
            let location = self.locate(path, SCANDIR).await?;
            let (prefix, entries) = self.list_children(path, SCANDIR).await?;
            if entries.is_empty() && !self.converter.is_bucket_root(path) {
                return Err(create_error(ErrorCode::NotFound, Some(path), SCANDIR));
            }

            let mut children: BTreeMap<String, FileType> = BTreeMap::new();
            for entry in &entries {
                let Some(raw) = entry.prefix.as_deref().or(entry.name.as_deref()) else {
                    tracing::warn!(
                        bucket = %location.bucket,
                        prefix = %prefix.key,
                        "Skipping listing entry without a name"
                    );
                    continue;
                };
                let Some(DirEntry { name, file_type }) = self.converter.child_entry(&prefix.key, raw)
                else {
                    continue;
                };
                children
                    .entry(name)
                    .and_modify(|existing| {
                        if file_type == FileType::Directory {
                            *existing = FileType::Directory;
                        }
                    })
                    .or_insert(file_type);
            }

            Ok(children.into_iter().map(|(name, file_type)| DirEntry::new(name, file_type)).collect())
        })
        .await
    }

    /// Create the directory marker for `path`. With `recursive`, missing
    /// ancestors are created and an existing directory is not an error.
    pub async fn mkdir(&self, path: &str, recursive: bool) -> FsResult<()> {
        self.instrumented("mkdir", path, async {
            self.converter.validate_directory(path).map_err(|err| err.with_syscall(MKDIR))?;
            self.locate(path, MKDIR).await?;
            let root = self.converter.is_bucket_root(path);
            if !root && self.file_exists(path, MKDIR).await? {
                return Err(create_error(ErrorCode::AlreadyExists, Some(path), MKDIR));
            }

            let exists = root || self.directory_exists(path, MKDIR).await?;
            if exists {
                if recursive {
                    return Ok(());
                }
                return Err(create_error(ErrorCode::AlreadyExists, Some(path), MKDIR));
            }

            let parent = parent_path(path);
            if recursive {
                self.create_ancestors(&parent, MKDIR).await?;
            } else if !self.converter.is_bucket_root(&parent)
                && !self.directory_exists(&parent, MKDIR).await?
            {
                return Err(create_error(ErrorCode::NotFound, Some(path), MKDIR));
            }

            self.put_marker(path, MKDIR).await
        })
        .await
    }

    /// Remove the marker of an empty directory
    pub async fn rmdir(&self, path: &str) -> FsResult<()> {
        self.instrumented("rmdir", path, async {
            self.locate(path, RMDIR).await?;
            if self.converter.is_bucket_root(path) {
                return Err(create_error(ErrorCode::InvalidArgument, Some(path), RMDIR));
            }

            let (marker, entries) = self.list_children(path, RMDIR).await?;
            let occupied = entries.iter().any(|entry| {
                entry.prefix.is_some() || entry.name.as_deref().is_some_and(|name| name != marker.key)
            });
            if occupied {
                return Err(create_error(ErrorCode::NotEmpty, Some(path), RMDIR));
            }

            self.client
                .remove_object(&marker.bucket, &marker.key)
                .await
                .map_err(translate(path, RMDIR))
        })
        .await
    }

    /// Stream the object at `path`. Chunk failures carry the converted
    /// [`FsError`] inside the `io::Error`.
    pub async fn create_read_stream(&self, path: &str) -> FsResult<ByteStream> {
        self.instrumented("create_read_stream", path, async {
            let location = self.locate_object(path, OPEN).await?;
            let body = self
                .client
                .get_object(&location.bucket, &location.key)
                .await
                .map_err(translate(path, OPEN))?;

            let path = path.to_string();
            let stream: ByteStream = Box::pin(body.map(move |chunk| {
                chunk.map_err(|err| io::Error::from(convert_error(err.into(), Some(&path), OPEN)))
            }));
            Ok(stream)
        })
        .await
    }

    /// Open a writable stream to `path`. The object is uploaded once the
    /// stream is shut down; the upload's outcome is reported by shutdown.
    pub async fn create_write_stream(&self, path: &str) -> FsResult<WriteStream> {
        self.instrumented("create_write_stream", path, async {
            let location = self.locate_new_object(path, OPEN).await?;
            let (sink, completion) = create_pass_through_stream();
            let (sender, receiver) = oneshot::channel();

            let client = Arc::clone(&self.client);
            let owned_path = path.to_string();
            tokio::spawn(async move {
                let result = match completion.await {
                    Ok(buffer) => {
                        let data = Data::Buffer(buffer);
                        let size = get_data_size(&data);
                        client
                            .put_object(&location.bucket, &location.key, to_readable_stream(data), size)
                            .await
                            .map_err(|err| convert_error(err, Some(&owned_path), OPEN))
                    }
                    Err(err) => Err(convert_error(err.into(), Some(&owned_path), OPEN)),
                };

                if let Err(err) = &result {
                    tracing::warn!(
                        bucket = %location.bucket,
                        key = %location.key,
                        "Upload failed: {}",
                        err
                    );
                }
                let _ = sender.send(result);
            });

            Ok(WriteStream::new(sink, receiver, path))
        })
        .await
    }
}
