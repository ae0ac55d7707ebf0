//! Album catalog port and its adapters.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

use async_trait::async_trait;
use gallery_model::{Album, AlbumId, BucketName, NewAlbum, PermissionMap, Tag};

use crate::{error::CatalogResult, filter::AlbumFilters};

pub use memory::InMemoryAlbumRepository;
#[cfg(feature = "database")]
pub use postgres::PostgresAlbumRepository;

/// User and group grants on one album.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumPermissions {
    pub users: PermissionMap,
    pub groups: PermissionMap,
}

impl AlbumPermissions {
    pub fn new(users: PermissionMap, groups: PermissionMap) -> Self {
        Self { users, groups }
    }

    pub fn of(album: &Album) -> Self {
        Self {
            users: album.user_permissions.clone(),
            groups: album.group_permissions.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.values().all(|set| set.is_empty())
            && self.groups.values().all(|set| set.is_empty())
    }
}

/// Repository port for the album catalog.
///
/// Listing methods receive the compiled album filters so adapters can push
/// them into their own query; results are ordered by ascending id and
/// carry no media.
#[async_trait]
pub trait AlbumRepository: Send + Sync {
    /// Insert the record with its initial grants and tags; returns it with
    /// its id.
    async fn create(
        &self,
        album: NewAlbum,
        bucket: BucketName,
    ) -> CatalogResult<Album>;

    /// Update name, description, location, creation date and thumbnail.
    /// Grants and tags have their own methods.
    async fn update(&self, album: &Album) -> CatalogResult<()>;

    async fn delete(&self, id: AlbumId) -> CatalogResult<()>;

    async fn get_by_id(&self, id: AlbumId) -> CatalogResult<Option<Album>>;

    async fn get_all(&self, filters: &AlbumFilters) -> CatalogResult<Vec<Album>>;

    async fn get_by_owner_id(
        &self,
        owner_id: &str,
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>>;

    /// Albums on which `user_id` holds at least one grant.
    async fn get_by_user_id(
        &self,
        user_id: &str,
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>>;

    async fn get_by_group_name(
        &self,
        group: &str,
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>>;

    /// Albums on which any of `groups` holds at least one grant.
    async fn get_by_groups(
        &self,
        groups: &[String],
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>>;

    /// Add grants. Existing grants are kept.
    async fn set_permissions(
        &self,
        id: AlbumId,
        permissions: &AlbumPermissions,
    ) -> CatalogResult<()>;

    /// Drop every user and group grant on the album.
    async fn remove_permissions(&self, id: AlbumId) -> CatalogResult<()>;

    /// Attach a tag of the album owner, creating it on first use. An
    /// existing tag keeps its color unless `tag.color` is set.
    async fn associate_tag(&self, id: AlbumId, tag: &Tag) -> CatalogResult<()>;

    /// Detach the tag named `name`. Detaching an absent tag is not an error.
    async fn dissociate_tag(&self, id: AlbumId, name: &str) -> CatalogResult<()>;
}
