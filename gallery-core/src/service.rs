//! Album lifecycle: keeps each catalog record and its bucket in lockstep.

use std::{any::type_name_of_val, fmt, sync::Arc, time::Instant};

use gallery_model::{Album, AlbumId, BucketName, NewAlbum, Tag};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    catalog::{AlbumPermissions, AlbumRepository},
    error::{CatalogError, StorageError},
    storage::{ObjectStore, StorageCache, thumbnail_key},
};

const SUFFIX_LEN: usize = 8;
const MAX_SLUG_LEN: usize = BucketName::MAX_LEN - SUFFIX_LEN - 1;
const FALLBACK_SLUG: &str = "album";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("failed to create bucket {bucket}: {source}")]
    CreateBucket {
        bucket: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to create album: {source}")]
    CreateAlbum {
        #[source]
        source: CatalogError,
    },

    #[error("failed to update album {id}: {source}")]
    UpdateAlbum {
        id: AlbumId,
        #[source]
        source: CatalogError,
    },

    #[error("failed to delete bucket of album {id}: {source}")]
    DeleteBucket {
        id: AlbumId,
        #[source]
        source: StorageError,
    },

    #[error("failed to delete album {id}: {source}")]
    DeleteAlbum {
        id: AlbumId,
        #[source]
        source: CatalogError,
    },

    #[error("failed to set permissions on album {id}: {source}")]
    Permissions {
        id: AlbumId,
        #[source]
        source: CatalogError,
    },

    #[error("failed to change tags of album {id}: {source}")]
    Tags {
        id: AlbumId,
        #[source]
        source: CatalogError,
    },

    #[error("media operation on album {id} failed: {source}")]
    Media {
        id: AlbumId,
        #[source]
        source: StorageError,
    },
}

/// Lowercase ascii slug of an album name, safe as a bucket name prefix.
///
/// Characters outside `[a-z0-9.-]` become `-` (non-ascii ones are
/// dropped), runs of `-` collapse and the result never starts or ends with
/// `-` or `.`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if !ch.is_ascii() {
            continue;
        }
        let ch = ch.to_ascii_lowercase();
        let mapped = if ch.is_ascii_alphanumeric() || ch == '.' {
            ch
        } else {
            '-'
        };
        if mapped == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(mapped);
    }

    let trim = |s: &str| s.trim_matches(|c| c == '-' || c == '.').to_string();
    let mut slug = trim(&slug);
    if slug.len() > MAX_SLUG_LEN {
        slug = trim(&slug[..MAX_SLUG_LEN]);
    }
    if slug.is_empty() {
        slug = FALLBACK_SLUG.to_string();
    }
    slug
}

/// `<slug>-<8 random hex chars>`.
pub fn bucket_name_for(name: &str) -> Result<BucketName, StorageError> {
    let suffix = Uuid::new_v4().simple().to_string();
    let candidate = format!("{}-{}", slugify(name), &suffix[..SUFFIX_LEN]);
    BucketName::new(candidate)
        .map_err(|err| StorageError::InvalidArgument(err.to_string()))
}

pub struct AlbumService<R, S>
where
    R: AlbumRepository + ?Sized,
    S: ObjectStore + ?Sized,
{
    repository: Arc<R>,
    storage: Arc<StorageCache<S>>,
}

impl<R, S> fmt::Debug for AlbumService<R, S>
where
    R: AlbumRepository + ?Sized,
    S: ObjectStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlbumService")
            .field("repository", &type_name_of_val(self.repository.as_ref()))
            .field("storage", &self.storage)
            .finish()
    }
}

impl<R, S> AlbumService<R, S>
where
    R: AlbumRepository + ?Sized,
    S: ObjectStore + ?Sized,
{
    pub fn new(repository: Arc<R>, storage: Arc<StorageCache<S>>) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// Create the bucket, then the catalog record.
    ///
    /// If the catalog insert fails the bucket is deleted again; a failure
    /// of that cleanup is logged and the catalog error is returned.
    pub async fn create(&self, album: NewAlbum) -> Result<Album, ServiceError> {
        let started = Instant::now();
        let bucket = bucket_name_for(&album.name).map_err(|source| {
            ServiceError::CreateBucket {
                bucket: album.name.clone(),
                source,
            }
        })?;

        self.storage.create_bucket(&bucket).await.map_err(|source| {
            ServiceError::CreateBucket {
                bucket: bucket.to_string(),
                source,
            }
        })?;

        match self.repository.create(album, bucket.clone()).await {
            Ok(created) => {
                info!(
                    album_id = %created.id,
                    bucket = %bucket,
                    owner = %created.owner_id,
                    elapsed = ?started.elapsed(),
                    "album created"
                );
                Ok(created)
            }
            Err(source) => {
                if let Err(cleanup) = self.storage.delete_bucket(&bucket).await {
                    warn!(
                        bucket = %bucket,
                        error = %cleanup,
                        "failed to remove bucket after catalog insert failed"
                    );
                } else {
                    warn!(bucket = %bucket, "removed bucket after catalog insert failed");
                }
                Err(ServiceError::CreateAlbum { source })
            }
        }
    }

    /// Update catalog fields only; the bucket is untouched.
    pub async fn update(&self, album: &Album) -> Result<(), ServiceError> {
        self.repository
            .update(album)
            .await
            .map_err(|source| ServiceError::UpdateAlbum {
                id: album.id,
                source,
            })?;
        debug!(album_id = %album.id, "album updated");
        Ok(())
    }

    /// Delete the bucket, then the catalog record.
    ///
    /// A bucket failure keeps the record. A catalog failure after the bucket
    /// is gone leaves a record without a bucket; it is reported as
    /// [`ServiceError::DeleteAlbum`].
    pub async fn delete(&self, album: &Album) -> Result<(), ServiceError> {
        self.storage
            .delete_bucket(&album.bucket)
            .await
            .map_err(|source| ServiceError::DeleteBucket {
                id: album.id,
                source,
            })?;

        self.repository
            .delete(album.id)
            .await
            .map_err(|source| {
                warn!(
                    album_id = %album.id,
                    bucket = %album.bucket,
                    "bucket removed but catalog record could not be deleted"
                );
                ServiceError::DeleteAlbum {
                    id: album.id,
                    source,
                }
            })?;

        info!(album_id = %album.id, bucket = %album.bucket, "album deleted");
        Ok(())
    }

    /// Replace every grant on the album with `permissions`.
    pub async fn set_permissions(
        &self,
        id: AlbumId,
        permissions: &AlbumPermissions,
    ) -> Result<(), ServiceError> {
        let to_error = |source| ServiceError::Permissions { id, source };
        self.repository.remove_permissions(id).await.map_err(to_error)?;
        self.repository
            .set_permissions(id, permissions)
            .await
            .map_err(to_error)?;
        debug!(
            album_id = %id,
            users = permissions.users.len(),
            groups = permissions.groups.len(),
            "album permissions replaced"
        );
        Ok(())
    }

    pub async fn tag(&self, id: AlbumId, tag: &Tag) -> Result<(), ServiceError> {
        self.repository
            .associate_tag(id, tag)
            .await
            .map_err(|source| ServiceError::Tags { id, source })?;
        debug!(album_id = %id, tag = %tag.name, "album tagged");
        Ok(())
    }

    pub async fn untag(&self, id: AlbumId, name: &str) -> Result<(), ServiceError> {
        self.repository
            .dissociate_tag(id, name)
            .await
            .map_err(|source| ServiceError::Tags { id, source })?;
        debug!(album_id = %id, tag = name, "album untagged");
        Ok(())
    }

    pub async fn put_media(
        &self,
        album: &Album,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<(), ServiceError> {
        let size = content.len() as u64;
        self.storage
            .put_file(&album.bucket, filename, size, content)
            .await
            .map_err(|source| ServiceError::Media {
                id: album.id,
                source,
            })
    }

    /// Remove an object and, for nested keys, its thumbnail sibling.
    pub async fn remove_media(
        &self,
        album: &Album,
        filename: &str,
    ) -> Result<(), ServiceError> {
        self.storage
            .delete_file(&album.bucket, filename)
            .await
            .map_err(|source| ServiceError::Media {
                id: album.id,
                source,
            })?;

        if let Some(thumbnail) = thumbnail_key(filename) {
            match self.storage.delete_file(&album.bucket, &thumbnail).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(source) => {
                    return Err(ServiceError::Media {
                        id: album.id,
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    pub async fn media(
        &self,
        album: &Album,
        filename: &str,
    ) -> Result<Vec<u8>, ServiceError> {
        self.storage
            .get_file(&album.bucket, filename)
            .await
            .map_err(|source| ServiceError::Media {
                id: album.id,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, time::Duration};

    use super::*;
    use crate::{
        catalog::InMemoryAlbumRepository,
        filter::AlbumFilters,
        query::{AlbumQuery, QueryError},
        storage::InMemoryObjectStore,
    };
    use gallery_model::{Permission, PermissionMap};

    struct Fixture {
        repo: Arc<InMemoryAlbumRepository>,
        store: Arc<InMemoryObjectStore>,
        cache: Arc<StorageCache<InMemoryObjectStore>>,
        service: AlbumService<InMemoryAlbumRepository, InMemoryObjectStore>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryAlbumRepository::new());
        let store = Arc::new(InMemoryObjectStore::new());
        let cache = Arc::new(StorageCache::new(
            Arc::clone(&store),
            Duration::from_secs(300),
        ));
        let service = AlbumService::new(Arc::clone(&repo), Arc::clone(&cache));
        Fixture {
            repo,
            store,
            cache,
            service,
        }
    }

    #[test]
    fn slugs_are_bucket_safe() {
        assert_eq!(slugify("Trip"), "trip");
        assert_eq!(slugify("Summer  Trip_2024$"), "summer-trip-2024");
        assert_eq!(slugify("a/b\\c:d*e?f\"g<h>i|j#k"), "a-b-c-d-e-f-g-h-i-j-k");
        assert_eq!(slugify("Café Crème"), "caf-crme");
        assert_eq!(slugify("!!!"), "album");
        assert_eq!(slugify("v1."), "v1");

        let long = slugify(&"x".repeat(200));
        assert_eq!(long.len(), MAX_SLUG_LEN);
    }

    #[test]
    fn bucket_names_carry_random_suffix() {
        let a = bucket_name_for("Trip").unwrap();
        let b = bucket_name_for("Trip").unwrap();
        assert_ne!(a, b);
        let (slug, suffix) = a.as_str().rsplit_once('-').unwrap();
        assert_eq!(slug, "trip");
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| b.is_ascii_hexdigit()));

        assert!(bucket_name_for(&"é".repeat(10)).unwrap().as_str().starts_with("album-"));
        assert!(bucket_name_for(&"y".repeat(300)).is_ok());
    }

    #[tokio::test]
    async fn trip_lifecycle() {
        let fx = fixture();
        let trip = fx.service.create(NewAlbum::new("Trip", "u1")).await.unwrap();

        assert!(trip.bucket.as_str().starts_with("trip-"));
        assert!(fx.cache.bucket_exists(&trip.bucket).await.unwrap());
        let stored = fx.repo.get_by_id(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.bucket, trip.bucket);

        fx.service.delete(&trip).await.unwrap();
        assert!(fx.cache.list_bucket(&trip.bucket).await.is_err());

        let query = AlbumQuery::new(Arc::clone(&fx.repo), Arc::clone(&fx.cache));
        assert!(matches!(
            query.first(trip.id).await,
            Err(QueryError::AlbumNotFound(id)) if id == trip.id
        ));
    }

    #[tokio::test]
    async fn update_rewrites_metadata_only() {
        let fx = fixture();
        let mut trip = fx.service.create(NewAlbum::new("Trip", "u1")).await.unwrap();
        let bucket = trip.bucket.clone();

        trip.name = "Road Trip".to_string();
        trip.location = Some("Lisbon".to_string());
        fx.service.update(&trip).await.unwrap();

        let stored = fx.repo.get_by_id(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Road Trip");
        assert_eq!(stored.location.as_deref(), Some("Lisbon"));
        assert_eq!(stored.bucket, bucket);

        fx.repo.delete(trip.id).await.unwrap();
        assert!(matches!(
            fx.service.update(&trip).await,
            Err(ServiceError::UpdateAlbum { id, .. }) if id == trip.id
        ));
    }

    #[tokio::test]
    async fn catalog_failure_removes_new_bucket() {
        let fx = fixture();
        fx.repo.set_fail_writes(true);

        let err = fx.service.create(NewAlbum::new("Trip", "u1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::CreateAlbum { .. }));
        assert!(fx.store.bucket_names().await.is_empty());
        assert!(fx.repo.is_empty().await);
    }

    #[tokio::test]
    async fn bucket_failure_skips_catalog_insert() {
        let fx = fixture();
        fx.store.set_fail_buckets(true);

        let err = fx.service.create(NewAlbum::new("Trip", "u1")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::CreateBucket { ref bucket, .. } if bucket.starts_with("trip-")
        ));
        assert!(fx.repo.is_empty().await);
        assert!(fx.store.bucket_names().await.is_empty());
    }

    #[tokio::test]
    async fn bucket_delete_failure_keeps_record() {
        let fx = fixture();
        let trip = fx.service.create(NewAlbum::new("Trip", "u1")).await.unwrap();
        fx.store.set_fail_buckets(true);

        let err = fx.service.delete(&trip).await.unwrap_err();
        assert!(matches!(err, ServiceError::DeleteBucket { id, .. } if id == trip.id));
        assert!(fx.repo.get_by_id(trip.id).await.unwrap().is_some());
        assert_eq!(fx.store.bucket_names().await, [trip.bucket.clone()]);
    }

    #[tokio::test]
    async fn tags_are_attached_and_detached() {
        let fx = fixture();
        let trip = fx.service.create(NewAlbum::new("Trip", "u1")).await.unwrap();

        fx.service.tag(trip.id, &Tag::new("sea").with_color("#0af")).await.unwrap();
        fx.service.tag(trip.id, &Tag::new("alps")).await.unwrap();
        fx.service.untag(trip.id, "alps").await.unwrap();
        let stored = fx.repo.get_by_id(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.tags, [Tag::new("sea").with_color("#0af")]);

        let err = fx.service.tag(AlbumId(999), &Tag::new("sea")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Tags {
                source: CatalogError::NotFound(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn catalog_delete_failure_is_reported() {
        let fx = fixture();
        let trip = fx.service.create(NewAlbum::new("Trip", "u1")).await.unwrap();
        fx.repo.set_fail_writes(true);

        let err = fx.service.delete(&trip).await.unwrap_err();
        assert!(matches!(err, ServiceError::DeleteAlbum { .. }));
        assert!(fx.repo.get_by_id(trip.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn permissions_are_replaced() {
        let fx = fixture();
        let trip = fx.service.create(NewAlbum::new("Trip", "u1")).await.unwrap();

        let grant = |user: &str, permission| {
            let mut users = PermissionMap::new();
            users.insert(user.to_string(), BTreeSet::from([permission]));
            AlbumPermissions::new(users, PermissionMap::new())
        };
        fx.service
            .set_permissions(trip.id, &grant("u2", Permission::AlbumRead))
            .await
            .unwrap();
        fx.service
            .set_permissions(trip.id, &grant("u3", Permission::AlbumEdit))
            .await
            .unwrap();

        let stored = fx.repo.get_by_id(trip.id).await.unwrap().unwrap();
        assert!(!stored.has_user_permissions("u2"));
        assert!(stored.has_user_permission("u3", Permission::AlbumEdit));

        let shared = fx
            .repo
            .get_by_user_id("u3", &AlbumFilters::new())
            .await
            .unwrap();
        assert_eq!(shared.len(), 1);
        assert!(
            fx.service
                .set_permissions(AlbumId(99), &AlbumPermissions::default())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn media_round_trip_and_thumbnail_cleanup() {
        let fx = fixture();
        let trip = fx.service.create(NewAlbum::new("Trip", "u1")).await.unwrap();

        fx.service
            .put_media(&trip, "photos/beach.jpg", b"jpeg".to_vec())
            .await
            .unwrap();
        fx.service
            .put_media(&trip, "thumbnail/beach.jpg", b"th".to_vec())
            .await
            .unwrap();
        assert_eq!(
            fx.service.media(&trip, "photos/beach.jpg").await.unwrap(),
            b"jpeg"
        );

        let query = AlbumQuery::new(Arc::clone(&fx.repo), Arc::clone(&fx.cache));
        let loaded = query.first(trip.id).await.unwrap();
        assert_eq!(loaded.photos.len(), 1);

        fx.service.remove_media(&trip, "photos/beach.jpg").await.unwrap();
        assert!(fx.cache.list_bucket(&trip.bucket).await.unwrap().is_empty());
        assert!(fx.service.media(&trip, "thumbnail/beach.jpg").await.is_err());

        let err = fx.service.remove_media(&trip, "photos/beach.jpg").await.unwrap_err();
        assert!(matches!(err, ServiceError::Media { .. }));
    }
}
