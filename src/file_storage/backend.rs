//! # Object Store Trait
//!
//! The hosted storage backend as a capability: buckets of byte objects
//! addressed by slash-separated paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::StorageResult;

/// Object metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub bucket: String,
    pub path: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Hex SHA-256 of the content
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl ObjectInfo {
    /// `bucket/path`
    pub fn key(&self) -> String {
        format!("{}/{}", self.bucket, self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
}

/// Calculate checksum for data
pub fn checksum(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object; an existing path is replaced only when `upsert`
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
        upsert: bool,
    ) -> StorageResult<ObjectInfo>;

    async fn download(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>>;

    /// Remove objects; missing paths are skipped. Returns what was removed
    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<Vec<ObjectInfo>>;

    /// Objects under `prefix`, ordered by path
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    async fn create_bucket(&self, name: &str, public: bool) -> StorageResult<BucketInfo>;

    async fn get_bucket(&self, name: &str) -> StorageResult<BucketInfo>;

    /// Fails with `BucketNotEmpty` while objects remain
    async fn delete_bucket(&self, name: &str) -> StorageResult<()>;

    /// Remove every object; returns how many were removed
    async fn empty_bucket(&self, name: &str) -> StorageResult<usize>;

    async fn list_buckets(&self) -> StorageResult<Vec<BucketInfo>>;
}
