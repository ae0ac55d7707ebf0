use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gallery_model::{BucketName, Media};
use tracing::debug;
use uuid::Uuid;

use super::{
    ObjectEntry, ObjectStore, assemble_listing, check_size, validate_object_key,
};
use crate::error::{StorageError, StorageResult};

const UPLOAD_PREFIX: &str = ".upload-";

/// Filesystem-backed object store: one directory per bucket under `root`,
/// one file per object. Nested keys map to subdirectories.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open the store, creating `root` if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &BucketName) -> PathBuf {
        self.root.join(bucket.as_str())
    }

    async fn existing_bucket_dir(
        &self,
        bucket: &BucketName,
    ) -> StorageResult<PathBuf> {
        let dir = self.bucket_dir(bucket);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StorageError::BucketNotFound(bucket.to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::BucketNotFound(bucket.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn object_path(
        &self,
        bucket: &BucketName,
        filename: &str,
    ) -> StorageResult<PathBuf> {
        validate_object_key(filename)?;
        Ok(self.existing_bucket_dir(bucket).await?.join(filename))
    }
}

fn not_found(bucket: &BucketName, filename: &str) -> StorageError {
    StorageError::ObjectNotFound {
        bucket: bucket.to_string(),
        filename: filename.to_string(),
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list_bucket(
        &self,
        bucket: &BucketName,
    ) -> StorageResult<Vec<Media>> {
        let dir = self.existing_bucket_dir(bucket).await?;
        let mut entries = Vec::new();
        let mut pending = vec![(dir, String::new())];

        while let Some((path, prefix)) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&path).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with(UPLOAD_PREFIX) {
                    continue;
                }
                let key = format!("{prefix}{name}");
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    pending.push((entry.path(), format!("{key}/")));
                } else if meta.is_file() {
                    let created_at: DateTime<Utc> = meta.modified()?.into();
                    entries.push(ObjectEntry { key, created_at });
                }
            }
        }

        debug!(bucket = %bucket, objects = entries.len(), "listed bucket directory");
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
        let path = self.object_path(bucket, filename).await?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.bucket_dir(bucket));
        tokio::fs::create_dir_all(&parent).await?;

        let staging = parent.join(format!("{UPLOAD_PREFIX}{}", Uuid::new_v4()));
        tokio::fs::write(&staging, &content).await?;
        if let Err(err) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn get_file(
        &self,
        bucket: &BucketName,
        filename: &str,
    ) -> StorageResult<Vec<u8>> {
        let path = self.object_path(bucket, filename).await?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(not_found(bucket, filename))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_file(
        &self,
        bucket: &BucketName,
        filename: &str,
    ) -> StorageResult<()> {
        let path = self.object_path(bucket, filename).await?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(not_found(bucket, filename))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn create_bucket(&self, bucket: &BucketName) -> StorageResult<()> {
        match tokio::fs::create_dir(self.bucket_dir(bucket)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::BucketAlreadyExists(bucket.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_bucket(&self, bucket: &BucketName) -> StorageResult<()> {
        match tokio::fs::remove_dir_all(self.bucket_dir(bucket)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn bucket_exists(&self, bucket: &BucketName) -> StorageResult<bool> {
        match self.existing_bucket_dir(bucket).await {
            Ok(_) => Ok(true),
            Err(StorageError::BucketNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_model::MediaType;

    #[tokio::test]
    async fn objects_round_trip_through_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(tmp.path().join("buckets")).await.unwrap();
        let bucket = BucketName::new("trip-1a2b3c4d").unwrap();

        assert!(!store.bucket_exists(&bucket).await.unwrap());
        store.create_bucket(&bucket).await.unwrap();
        assert!(matches!(
            store.create_bucket(&bucket).await,
            Err(StorageError::BucketAlreadyExists(_))
        ));

        store
            .put_file(&bucket, "photos/beach.jpg", 4, b"jpeg".to_vec())
            .await
            .unwrap();
        store
            .put_file(&bucket, "thumbnail/beach.jpg", 2, b"th".to_vec())
            .await
            .unwrap();
        store.put_file(&bucket, "clip.mov", 1, vec![0]).await.unwrap();

        let listing = store.list_bucket(&bucket).await.unwrap();
        let mut keys: Vec<_> =
            listing.iter().map(|m| m.filename.as_str()).collect();
        keys.sort();
        assert_eq!(keys, ["clip.mov", "photos/beach.jpg"]);
        let beach = listing
            .iter()
            .find(|m| m.filename == "photos/beach.jpg")
            .unwrap();
        assert_eq!(beach.media_type, MediaType::Photo);
        assert_eq!(beach.thumbnail.as_deref(), Some("thumbnail/beach.jpg"));

        assert_eq!(
            store.get_file(&bucket, "photos/beach.jpg").await.unwrap(),
            b"jpeg"
        );
        store.delete_file(&bucket, "clip.mov").await.unwrap();
        assert!(
            store
                .get_file(&bucket, "clip.mov")
                .await
                .unwrap_err()
                .is_not_found()
        );

        store.delete_bucket(&bucket).await.unwrap();
        store.delete_bucket(&bucket).await.unwrap();
        assert!(matches!(
            store.list_bucket(&bucket).await,
            Err(StorageError::BucketNotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_keys_escaping_the_bucket() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(tmp.path()).await.unwrap();
        let bucket = BucketName::new("trip").unwrap();
        store.create_bucket(&bucket).await.unwrap();

        assert!(matches!(
            store.put_file(&bucket, "../evil.jpg", 1, vec![1]).await,
            Err(StorageError::InvalidArgument(_))
        ));
    }
}
