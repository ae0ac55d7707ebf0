use std::{
    collections::{BTreeMap, HashMap},
    io,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gallery_model::{BucketName, Media};
use tokio::sync::Mutex;

use super::{
    ObjectEntry, ObjectStore, assemble_listing, check_size, validate_object_key,
};
use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone)]
struct StoredObject {
    content: Vec<u8>,
    created_at: DateTime<Utc>,
}

/// Process-local object store.
///
/// Counts `list_bucket` calls so callers can observe how often the
/// listing path is actually hit. An optional listing delay makes
/// concurrent callers overlap. `set_fail_buckets(true)` makes bucket
/// creation and deletion fail with an IO error.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    buckets: Mutex<HashMap<BucketName, BTreeMap<String, StoredObject>>>,
    list_calls: AtomicUsize,
    list_delay: Option<Duration>,
    fail_buckets: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn set_fail_buckets(&self, fail: bool) {
        self.fail_buckets.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub async fn bucket_names(&self) -> Vec<BucketName> {
        let mut names: Vec<_> =
            self.buckets.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    fn check_buckets_writable(&self) -> StorageResult<()> {
        if self.fail_buckets.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::other(
                "bucket operations disabled",
            )));
        }
        Ok(())
    }

    /// Insert an object with an explicit creation time.
    pub async fn insert_object(
        &self,
        bucket: &BucketName,
        filename: &str,
        content: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        validate_object_key(filename)?;
        let mut buckets = self.buckets.lock().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        objects.insert(
            filename.to_string(),
            StoredObject {
                content,
                created_at,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list_bucket(
        &self,
        bucket: &BucketName,
    ) -> StorageResult<Vec<Media>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }

        let buckets = self.buckets.lock().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        let entries = objects
            .iter()
            .map(|(key, object)| ObjectEntry {
                key: key.clone(),
                created_at: object.created_at,
            })
            .collect();
        Ok(assemble_listing(bucket, entries))
    }

    async fn put_file(
        &self,
        bucket: &BucketName,
        filename: &str,
        size: u64,
        content: Vec<u8>,
    ) -> StorageResult<()> {
        check_size(filename, size, &content)?;
        self.insert_object(bucket, filename, content, Utc::now()).await
    }

    async fn get_file(
        &self,
        bucket: &BucketName,
        filename: &str,
    ) -> StorageResult<Vec<u8>> {
        validate_object_key(filename)?;
        let buckets = self.buckets.lock().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        objects
            .get(filename)
            .map(|object| object.content.clone())
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                filename: filename.to_string(),
            })
    }

    async fn delete_file(
        &self,
        bucket: &BucketName,
        filename: &str,
    ) -> StorageResult<()> {
        validate_object_key(filename)?;
        let mut buckets = self.buckets.lock().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        objects
            .remove(filename)
            .map(|_| ())
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                filename: filename.to_string(),
            })
    }

    async fn create_bucket(&self, bucket: &BucketName) -> StorageResult<()> {
        self.check_buckets_writable()?;
        let mut buckets = self.buckets.lock().await;
        if buckets.contains_key(bucket) {
            return Err(StorageError::BucketAlreadyExists(bucket.to_string()));
        }
        buckets.insert(bucket.clone(), BTreeMap::new());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &BucketName) -> StorageResult<()> {
        self.check_buckets_writable()?;
        self.buckets.lock().await.remove(bucket);
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &BucketName) -> StorageResult<bool> {
        Ok(self.buckets.lock().await.contains_key(bucket))
    }
}
