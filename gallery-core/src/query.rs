//! Visible-album aggregation.
//!
//! [`AlbumQuery`] is a fluent builder: attach filters, visibility paths,
//! a sorter and pagination, then call [`AlbumQuery::all`] for a principal.
//! Each enabled path is fetched from the catalog with the same filters,
//! every result list is merged into one id-keyed map, and the merged set is
//! narrowed by an optional [`AlbumSearch`], ordered and paginated.

use std::{any::type_name_of_val, collections::BTreeMap, fmt, sync::Arc};

use gallery_model::{Album, AlbumId, MediaType, User};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    catalog::AlbumRepository,
    error::{CatalogError, StorageError},
    filter::{AlbumFilter, AlbumFilters},
    search::AlbumSearch,
    sort::{AlbumSorter, SortKey, SortOrder},
    storage::{ObjectStore, StorageCache},
};

/// Catalog path an album list was fetched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchPath {
    Personal,
    All,
    Shared,
    Group,
}

impl FetchPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchPath::Personal => "personal",
            FetchPath::All => "all",
            FetchPath::Shared => "shared",
            FetchPath::Group => "group",
        }
    }
}

impl fmt::Display for FetchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("failed to get {path} albums: {source}")]
    GetAlbums {
        path: FetchPath,
        #[source]
        source: CatalogError,
    },

    #[error("album {0} not found")]
    AlbumNotFound(AlbumId),

    #[error("failed to list media of album {id}: {source}")]
    ListBucket {
        id: AlbumId,
        #[source]
        source: StorageError,
    },
}

/// One page of a visible-album query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumPage {
    pub albums: Vec<Album>,
    /// Size of the merged, filtered set before pagination.
    pub total: usize,
}

pub struct AlbumQuery<R, S>
where
    R: AlbumRepository + ?Sized,
    S: ObjectStore + ?Sized,
{
    repository: Arc<R>,
    storage: Arc<StorageCache<S>>,
    filters: AlbumFilters,
    limit: Option<usize>,
    offset: usize,
    personal: bool,
    shared: bool,
    sorter: Option<AlbumSorter>,
    search: Option<AlbumSearch>,
}

impl<R, S> fmt::Debug for AlbumQuery<R, S>
where
    R: AlbumRepository + ?Sized,
    S: ObjectStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlbumQuery")
            .field("repository", &type_name_of_val(self.repository.as_ref()))
            .field("filters", &self.filters)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("personal", &self.personal)
            .field("shared", &self.shared)
            .field("sorter", &self.sorter)
            .field("search", &self.search.as_ref().map(AlbumSearch::as_str))
            .finish()
    }
}

impl<R, S> Clone for AlbumQuery<R, S>
where
    R: AlbumRepository + ?Sized,
    S: ObjectStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            storage: Arc::clone(&self.storage),
            filters: self.filters.clone(),
            limit: self.limit,
            offset: self.offset,
            personal: self.personal,
            shared: self.shared,
            sorter: self.sorter,
            search: self.search.clone(),
        }
    }
}

impl<R, S> AlbumQuery<R, S>
where
    R: AlbumRepository + ?Sized,
    S: ObjectStore + ?Sized,
{
    /// Empty query: no path enabled, no filters, no sorter.
    pub fn new(repository: Arc<R>, storage: Arc<StorageCache<S>>) -> Self {
        Self {
            repository,
            storage,
            filters: AlbumFilters::new(),
            limit: None,
            offset: 0,
            personal: false,
            shared: false,
            sorter: None,
            search: None,
        }
    }

    // === Options ===

    pub fn filter(mut self, filter: AlbumFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: AlbumFilters) -> Self {
        self.filters.extend(filters.iter().cloned());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Include albums owned by the principal.
    pub fn personal(mut self, personal: bool) -> Self {
        self.personal = personal;
        self
    }

    /// Include albums shared with the principal (every album for admins).
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    pub fn sort(mut self, key: SortKey, order: SortOrder) -> Self {
        self.sorter = Some(AlbumSorter::new(key, order));
        self
    }

    pub fn sorter(mut self, sorter: Option<AlbumSorter>) -> Self {
        self.sorter = sorter;
        self
    }

    /// Keep only merged albums matching `search`. Runs after the catalog
    /// fetch, so `total` counts matches only.
    pub fn search(mut self, search: AlbumSearch) -> Self {
        self.search = Some(search);
        self
    }

    // === Execution ===

    /// Albums visible to `principal`, merged, searched, ordered and
    /// paginated.
    pub async fn all(&self, principal: &User) -> Result<AlbumPage, QueryError> {
        let mut merged: BTreeMap<AlbumId, Album> = BTreeMap::new();

        if self.personal {
            let albums = self
                .repository
                .get_by_owner_id(&principal.id, &self.filters)
                .await
                .map_err(|source| QueryError::GetAlbums {
                    path: FetchPath::Personal,
                    source,
                })?;
            self.merge(&mut merged, FetchPath::Personal, albums);
        }

        if self.shared {
            if principal.is_admin() {
                let albums = self
                    .repository
                    .get_all(&self.filters)
                    .await
                    .map_err(|source| QueryError::GetAlbums {
                        path: FetchPath::All,
                        source,
                    })?;
                self.merge(&mut merged, FetchPath::All, albums);
            } else if principal.can_share {
                let albums = self
                    .repository
                    .get_by_user_id(&principal.id, &self.filters)
                    .await
                    .map_err(|source| QueryError::GetAlbums {
                        path: FetchPath::Shared,
                        source,
                    })?;
                self.merge(&mut merged, FetchPath::Shared, albums);

                let groups = principal.group_names();
                if !groups.is_empty() {
                    let albums = self
                        .repository
                        .get_by_groups(&groups, &self.filters)
                        .await
                        .map_err(|source| QueryError::GetAlbums {
                            path: FetchPath::Group,
                            source,
                        })?;
                    self.merge(&mut merged, FetchPath::Group, albums);
                }
            }
        }

        let mut albums: Vec<Album> = merged.into_values().collect();
        if let Some(search) = &self.search {
            albums.retain(|album| search.matches(album));
        }
        if let Some(sorter) = &self.sorter {
            sorter.sort(&mut albums);
        }

        let total = albums.len();
        let albums: Vec<Album> = albums
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();

        debug!(
            principal = %principal.id,
            total,
            returned = albums.len(),
            "resolved visible albums"
        );
        Ok(AlbumPage { albums, total })
    }

    /// Load one album with its media split into photos and videos.
    pub async fn first(&self, id: AlbumId) -> Result<Album, QueryError> {
        let mut album = self
            .repository
            .get_by_id(id)
            .await
            .map_err(|source| QueryError::GetAlbums {
                path: FetchPath::All,
                source,
            })?
            .ok_or(QueryError::AlbumNotFound(id))?;

        let media = self
            .storage
            .list_bucket(&album.bucket)
            .await
            .map_err(|source| QueryError::ListBucket { id, source })?;

        for item in media.iter() {
            match item.media_type {
                MediaType::Photo => album.photos.push(item.clone()),
                MediaType::Video => album.videos.push(item.clone()),
                MediaType::Unknown => {}
            }
        }
        Ok(album)
    }

    fn merge(
        &self,
        merged: &mut BTreeMap<AlbumId, Album>,
        path: FetchPath,
        albums: Vec<Album>,
    ) {
        for album in albums {
            if !self.filters.matches(&album) {
                warn!(
                    album_id = %album.id,
                    path = %path,
                    "catalog returned an album outside the requested filters"
                );
                continue;
            }
            merged.insert(album.id, album);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{
        catalog::{AlbumPermissions, InMemoryAlbumRepository},
        storage::InMemoryObjectStore,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use gallery_model::{
        BucketName, NewAlbum, Permission, PermissionMap, Role, Tag,
    };
    use std::time::Duration;

    type Query = AlbumQuery<InMemoryAlbumRepository, InMemoryObjectStore>;

    struct Fixture {
        repo: Arc<InMemoryAlbumRepository>,
        store: Arc<InMemoryObjectStore>,
        cache: Arc<StorageCache<InMemoryObjectStore>>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryObjectStore::new());
            let cache = Arc::new(StorageCache::new(
                Arc::clone(&store),
                Duration::from_secs(60),
            ));
            Self {
                repo: Arc::new(InMemoryAlbumRepository::new()),
                store,
                cache,
            }
        }

        fn query(&self) -> Query {
            AlbumQuery::new(Arc::clone(&self.repo), Arc::clone(&self.cache))
        }

        async fn album(&self, name: &str, owner: &str) -> Album {
            let n = self.repo.len().await + 1;
            self.repo
                .create(
                    NewAlbum::new(name, owner).with_created_at(
                        Utc.with_ymd_and_hms(2024, 1, n as u32, 0, 0, 0).unwrap(),
                    ),
                    BucketName::new(format!("album-{n}")).unwrap(),
                )
                .await
                .unwrap()
        }

        async fn share_with_user(&self, album: &Album, user: &str) {
            let mut users = PermissionMap::new();
            users.insert(user.into(), BTreeSet::from([Permission::AlbumRead]));
            self.repo
                .set_permissions(
                    album.id,
                    &AlbumPermissions::new(users, PermissionMap::new()),
                )
                .await
                .unwrap();
        }

        async fn share_with_group(&self, album: &Album, group: &str) {
            let mut groups = PermissionMap::new();
            groups.insert(group.into(), BTreeSet::from([Permission::AlbumRead]));
            self.repo
                .set_permissions(
                    album.id,
                    &AlbumPermissions::new(PermissionMap::new(), groups),
                )
                .await
                .unwrap();
        }
    }

    fn ids(page: &AlbumPage) -> Vec<i32> {
        page.albums.iter().map(|a| a.id.0).collect()
    }

    fn sharer(id: &str) -> User {
        User::new(id, id).with_can_share(true)
    }

    #[tokio::test]
    async fn personal_albums_are_visible_only_to_owner() {
        let fx = Fixture::new();
        let album = fx.album("Trip", "u1").await;

        let mine = fx.query().personal(true).all(&User::new("u1", "ann")).await.unwrap();
        assert_eq!(ids(&mine), [album.id.0]);

        let other = User::new("u2", "bob");
        let theirs = fx.query().personal(true).all(&other).await.unwrap();
        assert!(theirs.albums.is_empty());
        let shared = fx.query().personal(true).shared(true).all(&other).await.unwrap();
        assert!(shared.albums.is_empty());
    }

    #[tokio::test]
    async fn admin_shared_path_lists_everything() {
        let fx = Fixture::new();
        fx.album("A", "u1").await;
        fx.album("B", "u2").await;

        let admin = User::new("root", "root").with_role(Role::Admin);
        let page = fx.query().shared(true).all(&admin).await.unwrap();
        assert_eq!(ids(&page), [1, 2]);
    }

    #[tokio::test]
    async fn non_sharing_principal_gets_no_shared_albums() {
        let fx = Fixture::new();
        let album = fx.album("A", "u1").await;
        fx.share_with_user(&album, "u2").await;

        let page = fx
            .query()
            .shared(true)
            .all(&User::new("u2", "bob"))
            .await
            .unwrap();
        assert!(page.albums.is_empty());
    }

    #[tokio::test]
    async fn overlapping_paths_deduplicate_idempotently() {
        let fx = Fixture::new();
        let a = fx.album("A", "u1").await;
        let b = fx.album("B", "u2").await;
        fx.share_with_user(&a, "u1").await;
        fx.share_with_user(&b, "u1").await;
        fx.share_with_group(&b, "family").await;

        let principal = sharer("u1").with_group("family");
        let query = fx.query().personal(true).shared(true);
        let first = query.all(&principal).await.unwrap();
        let second = query.all(&principal).await.unwrap();

        assert_eq!(ids(&first), [1, 2]);
        assert_eq!(first, second);
        assert_eq!(first.total, 2);
    }

    #[tokio::test]
    async fn user_and_group_shares_merge_in_full() {
        let fx = Fixture::new();
        for name in ["A", "B", "C"] {
            let album = fx.album(name, "owner").await;
            fx.share_with_user(&album, "u1").await;
        }
        let group_only = fx.album("D", "owner").await;
        fx.share_with_group(&group_only, "family").await;

        let page = fx
            .query()
            .shared(true)
            .all(&sharer("u1").with_group("family"))
            .await
            .unwrap();
        assert_eq!(ids(&page), [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn pagination_applies_after_sort() {
        let fx = Fixture::new();
        for name in ["D", "B", "A", "C", "E"] {
            fx.album(name, "u1").await;
        }

        let page = fx
            .query()
            .personal(true)
            .sort(SortKey::Name, SortOrder::Normal)
            .offset(1)
            .limit(2)
            .all(&User::new("u1", "ann"))
            .await
            .unwrap();
        let names: Vec<_> = page.albums.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["B", "C"]);
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn filters_apply_on_every_path() {
        let fx = Fixture::new();
        fx.album("A", "u1").await;
        let b = fx.album("B", "u2").await;
        fx.share_with_user(&b, "u1").await;

        let page = fx
            .query()
            .personal(true)
            .shared(true)
            .filter(AlbumFilter::not_owned_by(["u1"]))
            .all(&sharer("u1"))
            .await
            .unwrap();
        assert_eq!(ids(&page), [b.id.0]);
    }

    #[tokio::test]
    async fn search_narrows_the_merged_set_before_pagination() {
        let fx = Fixture::new();
        let trip = fx.album("Trip", "u1").await;
        let beach = fx.album("Beach", "u2").await;
        let _work = fx.album("Work", "u1").await;
        fx.repo.associate_tag(trip.id, &Tag::new("sea")).await.unwrap();
        fx.repo.associate_tag(beach.id, &Tag::new("sea")).await.unwrap();
        fx.share_with_user(&beach, "u1").await;

        let page = fx
            .query()
            .personal(true)
            .shared(true)
            .search("tag = 'sea' | name = 'Nowhere'".parse().unwrap())
            .sort(SortKey::Name, SortOrder::Normal)
            .limit(1)
            .all(&sharer("u1"))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(ids(&page), [beach.id.0]);

        let page = fx
            .query()
            .personal(true)
            .search(AlbumSearch::parse("date >= '02/01/2024' & tag != 'sea'").unwrap())
            .all(&sharer("u1"))
            .await
            .unwrap();
        let names: Vec<_> = page.albums.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Work"]);
    }

    /// Catalog double that ignores the filters it is given.
    #[derive(Debug, Default)]
    struct UnfilteredRepository {
        inner: InMemoryAlbumRepository,
    }

    #[async_trait]
    impl AlbumRepository for UnfilteredRepository {
        async fn create(
            &self,
            album: NewAlbum,
            bucket: BucketName,
        ) -> Result<Album, CatalogError> {
            self.inner.create(album, bucket).await
        }
        async fn update(&self, album: &Album) -> Result<(), CatalogError> {
            self.inner.update(album).await
        }
        async fn delete(&self, id: AlbumId) -> Result<(), CatalogError> {
            self.inner.delete(id).await
        }
        async fn get_by_id(
            &self,
            id: AlbumId,
        ) -> Result<Option<Album>, CatalogError> {
            self.inner.get_by_id(id).await
        }
        async fn get_all(
            &self,
            _filters: &AlbumFilters,
        ) -> Result<Vec<Album>, CatalogError> {
            self.inner.get_all(&AlbumFilters::new()).await
        }
        async fn get_by_owner_id(
            &self,
            owner_id: &str,
            _filters: &AlbumFilters,
        ) -> Result<Vec<Album>, CatalogError> {
            self.inner.get_by_owner_id(owner_id, &AlbumFilters::new()).await
        }
        async fn get_by_user_id(
            &self,
            user_id: &str,
            _filters: &AlbumFilters,
        ) -> Result<Vec<Album>, CatalogError> {
            self.inner.get_by_user_id(user_id, &AlbumFilters::new()).await
        }
        async fn get_by_group_name(
            &self,
            group: &str,
            _filters: &AlbumFilters,
        ) -> Result<Vec<Album>, CatalogError> {
            self.inner.get_by_group_name(group, &AlbumFilters::new()).await
        }
        async fn get_by_groups(
            &self,
            groups: &[String],
            _filters: &AlbumFilters,
        ) -> Result<Vec<Album>, CatalogError> {
            self.inner.get_by_groups(groups, &AlbumFilters::new()).await
        }
        async fn set_permissions(
            &self,
            id: AlbumId,
            permissions: &AlbumPermissions,
        ) -> Result<(), CatalogError> {
            self.inner.set_permissions(id, permissions).await
        }
        async fn remove_permissions(
            &self,
            id: AlbumId,
        ) -> Result<(), CatalogError> {
            self.inner.remove_permissions(id).await
        }
        async fn associate_tag(&self, id: AlbumId, tag: &Tag) -> Result<(), CatalogError> {
            self.inner.associate_tag(id, tag).await
        }
        async fn dissociate_tag(&self, id: AlbumId, name: &str) -> Result<(), CatalogError> {
            self.inner.dissociate_tag(id, name).await
        }
    }

    #[tokio::test]
    async fn filters_are_rechecked_after_fetch() {
        let repo = Arc::new(UnfilteredRepository::default());
        for (name, day) in [("old", 1), ("new", 5)] {
            repo.create(
                NewAlbum::new(name, "u1").with_created_at(
                    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
                ),
                BucketName::new(name).unwrap(),
            )
            .await
            .unwrap();
        }
        let cache = Arc::new(StorageCache::new(
            Arc::new(InMemoryObjectStore::new()),
            Duration::from_secs(60),
        ));

        let page = AlbumQuery::new(repo, cache)
            .personal(true)
            .filter(AlbumFilter::after(
                Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
            ))
            .all(&User::new("u1", "ann"))
            .await
            .unwrap();
        let names: Vec<_> = page.albums.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["new"]);
    }

    #[tokio::test]
    async fn first_partitions_media_by_type() {
        let fx = Fixture::new();
        let album = fx.album("Trip", "u1").await;
        fx.cache.create_bucket(&album.bucket).await.unwrap();
        for (key, minute) in [
            ("photos/a.jpg", 1),
            ("thumbnail/a.jpg", 2),
            ("clip.mp4", 3),
            ("notes.txt", 4),
        ] {
            fx.store
                .insert_object(
                    &album.bucket,
                    key,
                    vec![0],
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
                )
                .await
                .unwrap();
        }

        let loaded = fx.query().first(album.id).await.unwrap();
        assert_eq!(loaded.photos.len(), 1);
        assert_eq!(loaded.photos[0].thumbnail.as_deref(), Some("thumbnail/a.jpg"));
        assert_eq!(loaded.videos.len(), 1);
        assert_eq!(loaded.videos[0].filename, "clip.mp4");
    }

    #[tokio::test]
    async fn first_reports_missing_album_and_bucket() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.query().first(AlbumId(9)).await,
            Err(QueryError::AlbumNotFound(AlbumId(9)))
        ));

        let album = fx.album("No bucket", "u1").await;
        assert!(matches!(
            fx.query().first(album.id).await,
            Err(QueryError::ListBucket { .. })
        ));
    }

    #[tokio::test]
    async fn repository_failures_name_the_path() {
        struct Failing;

        #[async_trait]
        impl AlbumRepository for Failing {
            async fn create(&self, _: NewAlbum, _: BucketName) -> Result<Album, CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
            async fn update(&self, _: &Album) -> Result<(), CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
            async fn delete(&self, _: AlbumId) -> Result<(), CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
            async fn get_by_id(&self, _: AlbumId) -> Result<Option<Album>, CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
            async fn get_all(&self, _: &AlbumFilters) -> Result<Vec<Album>, CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
            async fn get_by_owner_id(&self, _: &str, _: &AlbumFilters) -> Result<Vec<Album>, CatalogError> {
                Ok(Vec::new())
            }
            async fn get_by_user_id(&self, _: &str, _: &AlbumFilters) -> Result<Vec<Album>, CatalogError> {
                Ok(Vec::new())
            }
            async fn get_by_group_name(&self, _: &str, _: &AlbumFilters) -> Result<Vec<Album>, CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
            async fn get_by_groups(&self, _: &[String], _: &AlbumFilters) -> Result<Vec<Album>, CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
            async fn set_permissions(&self, _: AlbumId, _: &AlbumPermissions) -> Result<(), CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
            async fn remove_permissions(&self, _: AlbumId) -> Result<(), CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
            async fn associate_tag(&self, _: AlbumId, _: &Tag) -> Result<(), CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
            async fn dissociate_tag(&self, _: AlbumId, _: &str) -> Result<(), CatalogError> {
                Err(CatalogError::Unavailable("down".into()))
            }
        }

        let cache = Arc::new(StorageCache::new(
            Arc::new(InMemoryObjectStore::new()),
            Duration::from_secs(60),
        ));
        let query = AlbumQuery::new(Arc::new(Failing), cache)
            .personal(true)
            .shared(true);

        let err = query.all(&sharer("u1").with_group("family")).await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::GetAlbums { path: FetchPath::Group, .. }
        ));
        assert_eq!(err.to_string(), "failed to get group albums: catalog unavailable: down");
    }
}
