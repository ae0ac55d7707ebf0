use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    catalog::{AlbumRepository, InMemoryAlbumRepository},
    identity::{IdentityProvider, StaticIdentityProvider, UserQuery},
    opaque::AlbumIdCipher,
    query::AlbumQuery,
    service::AlbumService,
    storage::{InMemoryObjectStore, ObjectStore, StorageCache},
};

/// Shared handles used by every request: the catalog, the cached object
/// store, the identity provider and the id cipher.
///
/// Built once at startup and cloned into request handlers.
#[derive(Clone)]
pub struct GalleryContext {
    pub albums: Arc<dyn AlbumRepository>,
    pub storage: Arc<StorageCache<dyn ObjectStore>>,
    pub identity: Arc<dyn IdentityProvider>,
    pub ids: AlbumIdCipher,
}

impl fmt::Debug for GalleryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GalleryContext")
            .field("albums", &type_name_of_val(self.albums.as_ref()))
            .field("storage", &self.storage)
            .field("identity", &type_name_of_val(self.identity.as_ref()))
            .finish_non_exhaustive()
    }
}

impl GalleryContext {
    pub fn new(
        albums: Arc<dyn AlbumRepository>,
        storage: Arc<StorageCache<dyn ObjectStore>>,
        identity: Arc<dyn IdentityProvider>,
        ids: AlbumIdCipher,
    ) -> Self {
        Self {
            albums,
            storage,
            identity,
            ids,
        }
    }

    /// Context backed entirely by process-local adapters.
    pub fn in_memory(cache_ttl: Duration, ids: AlbumIdCipher) -> Self {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        Self::new(
            Arc::new(InMemoryAlbumRepository::new()),
            Arc::new(StorageCache::new(store, cache_ttl)),
            Arc::new(StaticIdentityProvider::default()),
            ids,
        )
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn album_query(&self) -> AlbumQuery<dyn AlbumRepository, dyn ObjectStore> {
        AlbumQuery::new(Arc::clone(&self.albums), Arc::clone(&self.storage))
    }

    pub fn album_service(
        &self,
    ) -> AlbumService<dyn AlbumRepository, dyn ObjectStore> {
        AlbumService::new(Arc::clone(&self.albums), Arc::clone(&self.storage))
    }

    pub fn user_query(&self) -> UserQuery<dyn IdentityProvider> {
        UserQuery::new(Arc::clone(&self.identity))
    }
}
