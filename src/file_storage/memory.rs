//! # In-Memory Object Store

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::backend::{checksum, BucketInfo, ObjectInfo, ObjectStore};
use super::errors::{StorageError, StorageResult};

#[derive(Debug)]
struct StoredObject {
    info: ObjectInfo,
    data: Vec<u8>,
}

#[derive(Debug)]
struct Bucket {
    info: BucketInfo,
    objects: BTreeMap<String, StoredObject>,
}

/// Bucket registry with objects held in memory
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bucket<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Bucket) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets
            .get_mut(name)
            .ok_or_else(|| StorageError::BucketNotFound(name.to_string()))?;
        f(bucket)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
        upsert: bool,
    ) -> StorageResult<ObjectInfo> {
        self.with_bucket(bucket, |b| {
            if !upsert && b.objects.contains_key(path) {
                return Err(StorageError::ObjectAlreadyExists(format!("{}/{}", bucket, path)));
            }
            let info = ObjectInfo {
                bucket: bucket.to_string(),
                path: path.to_string(),
                size: data.len() as u64,
                content_type: content_type.map(str::to_string),
                checksum: checksum(data),
                created_at: Utc::now(),
            };
            b.objects.insert(
                path.to_string(),
                StoredObject {
                    info: info.clone(),
                    data: data.to_vec(),
                },
            );
            Ok(info)
        })
    }

    async fn download(&self, bucket: &str, path: &str) -> StorageResult<Vec<u8>> {
        self.with_bucket(bucket, |b| {
            b.objects
                .get(path)
                .map(|object| object.data.clone())
                .ok_or_else(|| StorageError::ObjectNotFound(format!("{}/{}", bucket, path)))
        })
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<Vec<ObjectInfo>> {
        self.with_bucket(bucket, |b| {
            Ok(paths
                .iter()
                .filter_map(|path| b.objects.remove(path))
                .map(|object| object.info)
                .collect())
        })
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        self.with_bucket(bucket, |b| {
            Ok(b.objects
                .range(prefix.to_string()..)
                .take_while(|(path, _)| path.starts_with(prefix))
                .map(|(_, object)| object.info.clone())
                .collect())
        })
    }

    async fn create_bucket(&self, name: &str, public: bool) -> StorageResult<BucketInfo> {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        if buckets.contains_key(name) {
            return Err(StorageError::BucketAlreadyExists(name.to_string()));
        }
        let info = BucketInfo {
            name: name.to_string(),
            public,
            created_at: Utc::now(),
        };
        buckets.insert(
            name.to_string(),
            Bucket {
                info: info.clone(),
                objects: BTreeMap::new(),
            },
        );
        Ok(info)
    }

    async fn get_bucket(&self, name: &str) -> StorageResult<BucketInfo> {
        self.with_bucket(name, |b| Ok(b.info.clone()))
    }

    async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        match buckets.get(name) {
            None => Err(StorageError::BucketNotFound(name.to_string())),
            Some(bucket) if !bucket.objects.is_empty() => {
                Err(StorageError::BucketNotEmpty(name.to_string()))
            }
            Some(_) => {
                buckets.remove(name);
                Ok(())
            }
        }
    }

    async fn empty_bucket(&self, name: &str) -> StorageResult<usize> {
        self.with_bucket(name, |b| {
            let removed = b.objects.len();
            b.objects.clear();
            Ok(removed)
        })
    }

    async fn list_buckets(&self) -> StorageResult<Vec<BucketInfo>> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        let mut infos: Vec<BucketInfo> = buckets.values().map(|b| b.info.clone()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_download() {
        let store = MemoryObjectStore::new();
        store.create_bucket("docs", false).await.unwrap();

        let info = store
            .upload("docs", "a/b.txt", b"hello", Some("text/plain"), false)
            .await
            .unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(info.key(), "docs/a/b.txt");
        assert_eq!(store.download("docs", "a/b.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_upload_conflict_unless_upsert() {
        let store = MemoryObjectStore::new();
        store.create_bucket("docs", false).await.unwrap();
        store.upload("docs", "x", b"1", None, false).await.unwrap();

        assert!(matches!(
            store.upload("docs", "x", b"2", None, false).await,
            Err(StorageError::ObjectAlreadyExists(_))
        ));
        store.upload("docs", "x", b"2", None, true).await.unwrap();
        assert_eq!(store.download("docs", "x").await.unwrap(), b"2");
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = MemoryObjectStore::new();
        store.create_bucket("docs", false).await.unwrap();
        for path in ["a/1", "a/2", "b/1"] {
            store.upload("docs", path, b"x", None, false).await.unwrap();
        }

        let listed = store.list("docs", "a/").await.unwrap();
        let paths: Vec<_> = listed.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(paths, vec!["a/1", "a/2"]);
        assert_eq!(store.list("docs", "").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let store = MemoryObjectStore::new();
        store.create_bucket("docs", true).await.unwrap();
        assert!(matches!(
            store.create_bucket("docs", true).await,
            Err(StorageError::BucketAlreadyExists(_))
        ));

        store.upload("docs", "x", b"1", None, false).await.unwrap();
        assert!(matches!(
            store.delete_bucket("docs").await,
            Err(StorageError::BucketNotEmpty(_))
        ));

        assert_eq!(store.empty_bucket("docs").await.unwrap(), 1);
        store.delete_bucket("docs").await.unwrap();
        assert!(store.list_buckets().await.unwrap().is_empty());
        assert!(matches!(
            store.download("docs", "x").await,
            Err(StorageError::BucketNotFound(_))
        ));
    }
}
