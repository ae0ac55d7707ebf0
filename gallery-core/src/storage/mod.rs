//! Object storage port, adapters and the read-through listing cache.

pub mod cache;
pub mod fs;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gallery_model::{BucketName, Media, MediaType};
use std::collections::HashMap;

use crate::error::{StorageError, StorageResult};

pub use cache::{CacheStats, StorageCache};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;

/// Key prefix under which thumbnails are stored inside an album bucket.
pub const THUMBNAIL_PREFIX: &str = "thumbnail/";

/// Object storage as seen by the gallery: one bucket per album.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Media contained in `bucket`, thumbnails folded into their media,
    /// ordered by creation time then filename.
    async fn list_bucket(&self, bucket: &BucketName)
    -> StorageResult<Vec<Media>>;

    async fn put_file(
        &self,
        bucket: &BucketName,
        filename: &str,
        size: u64,
        content: Vec<u8>,
    ) -> StorageResult<()>;

    async fn get_file(
        &self,
        bucket: &BucketName,
        filename: &str,
    ) -> StorageResult<Vec<u8>>;

    async fn delete_file(
        &self,
        bucket: &BucketName,
        filename: &str,
    ) -> StorageResult<()>;

    /// Fails with [`StorageError::BucketAlreadyExists`] if present.
    async fn create_bucket(&self, bucket: &BucketName) -> StorageResult<()>;

    /// Removes the bucket and every object in it. Missing buckets are not
    /// an error.
    async fn delete_bucket(&self, bucket: &BucketName) -> StorageResult<()>;

    async fn bucket_exists(&self, bucket: &BucketName) -> StorageResult<bool>;
}

/// Raw object as enumerated by an adapter before thumbnails are folded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub created_at: DateTime<Utc>,
}

/// Reject empty keys, absolute keys and keys escaping the bucket.
pub fn validate_object_key(filename: &str) -> StorageResult<()> {
    if filename.is_empty() {
        return Err(StorageError::InvalidArgument(
            "object key is empty".to_string(),
        ));
    }
    if filename.starts_with('/') || filename.contains('\\') {
        return Err(StorageError::InvalidArgument(format!(
            "object key {filename} must be a relative path"
        )));
    }
    if filename
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidArgument(format!(
            "object key {filename} contains an invalid segment"
        )));
    }
    Ok(())
}

pub(crate) fn check_size(
    filename: &str,
    size: u64,
    content: &[u8],
) -> StorageResult<()> {
    if content.len() as u64 != size {
        return Err(StorageError::InvalidArgument(format!(
            "object {filename}: declared size {size} but got {} bytes",
            content.len()
        )));
    }
    Ok(())
}

/// Turn a raw object enumeration into the media listing.
///
/// Objects under [`THUMBNAIL_PREFIX`] never appear as media; each one
/// populates the `thumbnail` of the media sharing its base filename.
pub fn assemble_listing(
    bucket: &BucketName,
    entries: Vec<ObjectEntry>,
) -> Vec<Media> {
    let (thumbs, objects): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|entry| entry.key.starts_with(THUMBNAIL_PREFIX));

    let thumbnails: HashMap<String, String> = thumbs
        .into_iter()
        .map(|entry| (basename(&entry.key).to_string(), entry.key))
        .collect();

    let mut media: Vec<Media> = objects
        .into_iter()
        .map(|entry| Media {
            media_type: MediaType::from_filename(&entry.key),
            thumbnail: thumbnails.get(basename(&entry.key)).cloned(),
            filename: entry.key,
            bucket: bucket.clone(),
            created_at: entry.created_at,
        })
        .collect();

    media.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    media
}

/// Key of the thumbnail sibling for a nested object key, if any.
pub fn thumbnail_key(filename: &str) -> Option<String> {
    if filename.starts_with(THUMBNAIL_PREFIX) {
        return None;
    }
    filename
        .rsplit_once('/')
        .map(|(_, name)| format!("{THUMBNAIL_PREFIX}{name}"))
}

fn basename(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(key: &str, minute: u32) -> ObjectEntry {
        ObjectEntry {
            key: key.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn listing_folds_thumbnails_and_orders_by_date() {
        let bucket = BucketName::new("trip-1").unwrap();
        let media = assemble_listing(
            &bucket,
            vec![
                entry("photos/b.jpg", 5),
                entry("thumbnail/b.jpg", 6),
                entry("a.mp4", 1),
                entry("notes.txt", 5),
            ],
        );

        let keys: Vec<_> = media.iter().map(|m| m.filename.as_str()).collect();
        assert_eq!(keys, ["a.mp4", "notes.txt", "photos/b.jpg"]);
        assert_eq!(media[0].media_type, MediaType::Video);
        assert_eq!(media[1].media_type, MediaType::Unknown);
        assert_eq!(media[2].thumbnail.as_deref(), Some("thumbnail/b.jpg"));
        assert_eq!(media[0].thumbnail, None);
    }

    #[test]
    fn object_key_validation() {
        assert!(validate_object_key("photos/a.jpg").is_ok());
        assert!(validate_object_key("").is_err());
        assert!(validate_object_key("/etc/passwd").is_err());
        assert!(validate_object_key("../x.jpg").is_err());
        assert!(validate_object_key("a//b.jpg").is_err());
    }

    #[test]
    fn thumbnail_sibling_only_for_nested_keys() {
        assert_eq!(
            thumbnail_key("photos/a.jpg").as_deref(),
            Some("thumbnail/a.jpg")
        );
        assert_eq!(thumbnail_key("a.jpg"), None);
        assert_eq!(thumbnail_key("thumbnail/a.jpg"), None);
    }
}
