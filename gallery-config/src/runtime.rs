use std::sync::Arc;

use anyhow::Context;
use gallery_core::{
    MIGRATOR,
    application::GalleryContext,
    catalog::{AlbumRepository, PostgresAlbumRepository},
    identity::{IdentityProvider, StaticIdentityProvider},
    storage::{FsObjectStore, ObjectStore, StorageCache},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::GalleryConfig;

/// Long-lived handles for a running gallery: the connection pool, the
/// shared context and the cache sweeper.
#[derive(Debug)]
pub struct GalleryRuntime {
    context: GalleryContext,
    pool: PgPool,
    shutdown: CancellationToken,
    sweeper: JoinHandle<()>,
}

impl GalleryRuntime {
    pub async fn bootstrap(config: &GalleryConfig) -> anyhow::Result<Self> {
        Self::bootstrap_with_identity(
            config,
            Arc::new(StaticIdentityProvider::default()),
        )
        .await
    }

    pub async fn bootstrap_with_identity(
        config: &GalleryConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> anyhow::Result<Self> {
        let ids = config
            .security
            .cipher()
            .context("invalid album id key")?;

        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await
            .context("failed to connect to postgres")?;
        MIGRATOR
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        let store = FsObjectStore::open(config.storage.root.clone())
            .await
            .with_context(|| {
                format!(
                    "failed to open object store at {}",
                    config.storage.root.display()
                )
            })?;
        let store: Arc<dyn ObjectStore> = Arc::new(store);
        let storage = Arc::new(StorageCache::new(store, config.cache.ttl));

        let shutdown = CancellationToken::new();
        let sweeper =
            storage.spawn_sweeper(config.cache.sweep_interval, shutdown.clone());

        let albums: Arc<dyn AlbumRepository> =
            Arc::new(PostgresAlbumRepository::new(pool.clone()));
        let context = GalleryContext::new(albums, storage, identity, ids);

        info!(
            storage_root = %config.storage.root.display(),
            cache_ttl = %humantime::format_duration(config.cache.ttl),
            "gallery runtime ready"
        );

        Ok(Self {
            context,
            pool,
            shutdown,
            sweeper,
        })
    }

    pub fn context(&self) -> &GalleryContext {
        &self.context
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Stop the sweeper and close the pool.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(err) = self.sweeper.await {
            warn!(error = %err, "cache sweeper ended abnormally");
        }
        self.pool.close().await;
        info!("gallery runtime stopped");
    }
}
