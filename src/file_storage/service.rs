//! # Storage Service
//!
//! Argument checks and the upload size cap in front of an [`ObjectStore`].

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, info};

use super::backend::{BucketInfo, ObjectInfo, ObjectStore};
use super::errors::{StorageError, StorageResult};
use crate::config::Config;
use crate::observability::Event;

/// Default upload cap: 50 MiB
pub const DEFAULT_UPLOAD_LIMIT: u64 = 50 * 1024 * 1024;

fn bucket_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9._-]{0,62}$").expect("valid bucket name regex")
    })
}

fn check_bucket(bucket: &str) -> StorageResult<()> {
    if bucket_name_pattern().is_match(bucket) {
        Ok(())
    } else {
        Err(StorageError::InvalidBucket(bucket.to_string()))
    }
}

/// Relative, slash-separated, no empty or `..` segments
fn check_path(path: &str) -> StorageResult<()> {
    let valid = !path.is_empty()
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

pub struct StorageService {
    store: Arc<dyn ObjectStore>,
    upload_limit: u64,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }

    pub fn from_config(store: Arc<dyn ObjectStore>, config: &Config) -> Self {
        Self::new(store).with_upload_limit(config.storage_upload_limit_bytes)
    }

    pub fn with_upload_limit(mut self, bytes: u64) -> Self {
        self.upload_limit = bytes;
        self
    }

    pub fn upload_limit(&self) -> u64 {
        self.upload_limit
    }

    /// Upload a new object; fails if the path is taken
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> StorageResult<ObjectInfo> {
        self.put(bucket, path, data, content_type, false).await
    }

    /// Upload, replacing any existing object at `path`
    pub async fn upsert(
        &self,
        bucket: &str,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> StorageResult<ObjectInfo> {
        self.put(bucket, path, data, content_type, true).await
    }

    async fn put(
        &self,
        bucket: &str,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
        upsert: bool,
    ) -> StorageResult<ObjectInfo> {
        check_bucket(bucket)?;
        if data.is_empty() {
            return Err(StorageError::EmptyFile);
        }
        check_path(path)?;
        let size = data.len() as u64;
        if size > self.upload_limit {
            return Err(StorageError::FileTooLarge(size, self.upload_limit));
        }

        let info = self
            .store
            .upload(bucket, path, data, content_type, upsert)
            .await?;
        info!(
            event = Event::StorageUpload.as_str(),
            key = %info.key(),
            size = info.size
        );
        Ok(info)
    }

    pub async fn download(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>> {
        check_bucket(bucket)?;
        check_path(path)?;

        let data = self.store.download(bucket, path).await?;
        debug!(
            event = Event::StorageDownload.as_str(),
            bucket,
            path,
            size = data.len()
        );
        Ok(data)
    }

    /// Remove objects; returns the ones that existed
    pub async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<Vec<ObjectInfo>> {
        check_bucket(bucket)?;
        if paths.is_empty() {
            return Err(StorageError::EmptyPathList);
        }
        for path in paths {
            check_path(path)?;
        }

        let removed = self.store.remove(bucket, paths).await?;
        info!(
            event = Event::StorageRemove.as_str(),
            bucket,
            requested = paths.len(),
            removed = removed.len()
        );
        Ok(removed)
    }

    /// Objects under `prefix`; an empty prefix lists the whole bucket
    pub async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        check_bucket(bucket)?;
        self.store.list(bucket, prefix).await
    }

    pub async fn create_bucket(&self, name: &str, public: bool) -> StorageResult<BucketInfo> {
        check_bucket(name)?;
        let info = self.store.create_bucket(name, public).await?;
        info!(event = Event::StorageBucketCreated.as_str(), bucket = name, public);
        Ok(info)
    }

    pub async fn get_bucket(&self, name: &str) -> StorageResult<BucketInfo> {
        check_bucket(name)?;
        self.store.get_bucket(name).await
    }

    pub async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        check_bucket(name)?;
        self.store.delete_bucket(name).await?;
        info!(event = Event::StorageBucketDeleted.as_str(), bucket = name);
        Ok(())
    }

    pub async fn empty_bucket(&self, name: &str) -> StorageResult<usize> {
        check_bucket(name)?;
        let removed = self.store.empty_bucket(name).await?;
        info!(event = Event::StorageRemove.as_str(), bucket = name, removed);
        Ok(removed)
    }

    pub async fn list_buckets(&self) -> StorageResult<Vec<BucketInfo>> {
        self.store.list_buckets().await
    }
}
