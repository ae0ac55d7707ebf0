use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use gallery_model::{Album, AlbumId, BucketName, NewAlbum, Tag, tag::upsert_tag};
use tokio::sync::Mutex;

use super::{AlbumPermissions, AlbumRepository};
use crate::{
    error::{CatalogError, CatalogResult},
    filter::AlbumFilters,
};

#[derive(Debug, Default)]
struct State {
    albums: BTreeMap<AlbumId, Album>,
    next_id: i32,
}

/// Process-local catalog. Ids are assigned sequentially from 1.
///
/// `set_fail_writes(true)` makes every mutating call fail with
/// [`CatalogError::Unavailable`].
#[derive(Debug, Default)]
pub struct InMemoryAlbumRepository {
    state: Mutex<State>,
    fail_writes: AtomicBool,
}

impl InMemoryAlbumRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.albums.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_writable(&self) -> CatalogResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable(
                "catalog writes disabled".to_string(),
            ));
        }
        Ok(())
    }

    async fn select<F>(
        &self,
        filters: &AlbumFilters,
        visible: F,
    ) -> CatalogResult<Vec<Album>>
    where
        F: Fn(&Album) -> bool + Send,
    {
        let state = self.state.lock().await;
        Ok(state
            .albums
            .values()
            .filter(|album| visible(album) && filters.matches(album))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AlbumRepository for InMemoryAlbumRepository {
    async fn create(
        &self,
        album: NewAlbum,
        bucket: BucketName,
    ) -> CatalogResult<Album> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        if state.albums.values().any(|existing| existing.bucket == bucket) {
            return Err(CatalogError::Corrupt(format!(
                "bucket {bucket} already assigned"
            )));
        }
        state.next_id += 1;
        let id = AlbumId(state.next_id);
        let album = album.into_album(id, bucket);
        state.albums.insert(id, album.clone());
        Ok(album)
    }

    async fn update(&self, album: &Album) -> CatalogResult<()> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let stored = state
            .albums
            .get_mut(&album.id)
            .ok_or(CatalogError::NotFound(album.id))?;
        stored.name = album.name.clone();
        stored.description = album.description.clone();
        stored.location = album.location.clone();
        stored.created_at = album.created_at;
        stored.thumbnail = album.thumbnail.clone();
        Ok(())
    }

    async fn delete(&self, id: AlbumId) -> CatalogResult<()> {
        self.check_writable()?;
        self.state
            .lock()
            .await
            .albums
            .remove(&id)
            .map(|_| ())
            .ok_or(CatalogError::NotFound(id))
    }

    async fn get_by_id(&self, id: AlbumId) -> CatalogResult<Option<Album>> {
        Ok(self.state.lock().await.albums.get(&id).cloned())
    }

    async fn get_all(&self, filters: &AlbumFilters) -> CatalogResult<Vec<Album>> {
        self.select(filters, |_| true).await
    }

    async fn get_by_owner_id(
        &self,
        owner_id: &str,
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>> {
        self.select(filters, |album| album.is_owned_by(owner_id)).await
    }

    async fn get_by_user_id(
        &self,
        user_id: &str,
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>> {
        self.select(filters, |album| album.has_user_permissions(user_id))
            .await
    }

    async fn get_by_group_name(
        &self,
        group: &str,
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>> {
        self.select(filters, |album| album.has_group_permissions(group))
            .await
    }

    async fn get_by_groups(
        &self,
        groups: &[String],
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>> {
        self.select(filters, |album| {
            groups.iter().any(|group| album.has_group_permissions(group))
        })
        .await
    }

    async fn set_permissions(
        &self,
        id: AlbumId,
        permissions: &AlbumPermissions,
    ) -> CatalogResult<()> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let album = state.albums.get_mut(&id).ok_or(CatalogError::NotFound(id))?;
        for (user, granted) in &permissions.users {
            album
                .user_permissions
                .entry(user.clone())
                .or_default()
                .extend(granted.iter().copied());
        }
        for (group, granted) in &permissions.groups {
            album
                .group_permissions
                .entry(group.clone())
                .or_default()
                .extend(granted.iter().copied());
        }
        Ok(())
    }

    async fn remove_permissions(&self, id: AlbumId) -> CatalogResult<()> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let album = state.albums.get_mut(&id).ok_or(CatalogError::NotFound(id))?;
        album.user_permissions.clear();
        album.group_permissions.clear();
        Ok(())
    }

    async fn associate_tag(&self, id: AlbumId, tag: &Tag) -> CatalogResult<()> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let album = state.albums.get_mut(&id).ok_or(CatalogError::NotFound(id))?;
        let color = tag.color.clone().or_else(|| {
            album
                .tags
                .iter()
                .find(|existing| existing.name == tag.name)
                .and_then(|existing| existing.color.clone())
        });
        upsert_tag(
            &mut album.tags,
            Tag {
                name: tag.name.clone(),
                color,
            },
        );
        Ok(())
    }

    async fn dissociate_tag(&self, id: AlbumId, name: &str) -> CatalogResult<()> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let album = state.albums.get_mut(&id).ok_or(CatalogError::NotFound(id))?;
        album.tags.retain(|tag| tag.name != name);
        Ok(())
    }
}
