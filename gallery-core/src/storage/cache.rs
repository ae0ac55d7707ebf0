use std::{
    any::type_name_of_val,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use gallery_model::{BucketName, Media};
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ObjectStore;
use crate::error::StorageResult;

#[derive(Debug)]
struct CachedListing {
    media: Arc<[Media]>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct BucketSlot {
    listing: Option<CachedListing>,
}

impl BucketSlot {
    fn fresh(&self, now: Instant) -> Option<Arc<[Media]>> {
        self.listing
            .as_ref()
            .filter(|cached| cached.expires_at > now)
            .map(|cached| Arc::clone(&cached.media))
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.fresh(now).is_none()
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
}

/// Read-through cache over an [`ObjectStore`]'s bucket listings.
///
/// Each bucket owns an async mutex that is held across the listing fetch,
/// so concurrent misses on one bucket collapse into a single store call.
/// Every mutating operation removes the bucket's slot from the map; a
/// fetch already in flight then completes into the detached slot and can
/// no longer be observed.
pub struct StorageCache<S>
where
    S: ObjectStore + ?Sized,
{
    store: Arc<S>,
    ttl: Duration,
    buckets: DashMap<BucketName, Arc<Mutex<BucketSlot>>>,
    counters: Counters,
}

impl<S> fmt::Debug for StorageCache<S>
where
    S: ObjectStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCache")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("ttl", &self.ttl)
            .field("buckets", &self.buckets.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<S> StorageCache<S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            buckets: DashMap::new(),
            counters: Counters::default(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Number of buckets currently tracked, fresh or not.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub async fn list_bucket(
        &self,
        bucket: &BucketName,
    ) -> StorageResult<Arc<[Media]>> {
        let slot = self
            .buckets
            .entry(bucket.clone())
            .or_insert_with(|| Arc::new(Mutex::new(BucketSlot::default())))
            .clone();

        let mut guard = slot.lock().await;
        if let Some(media) = guard.fresh(Instant::now()) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(bucket = %bucket, items = media.len(), "bucket listing cache hit");
            return Ok(media);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let started = std::time::Instant::now();
        let media: Arc<[Media]> = match self.store.list_bucket(bucket).await {
            Ok(media) => media.into(),
            Err(err) => {
                // A failed fetch leaves no slot behind.
                drop(guard);
                self.buckets
                    .remove_if(bucket, |_, current| Arc::ptr_eq(current, &slot));
                return Err(err.context("list_bucket", bucket.as_str(), None));
            }
        };

        guard.listing = Some(CachedListing {
            media: Arc::clone(&media),
            expires_at: Instant::now() + self.ttl,
        });
        debug!(
            bucket = %bucket,
            items = media.len(),
            elapsed = ?started.elapsed(),
            "bucket listing cache miss"
        );
        Ok(media)
    }

    pub async fn put_file(
        &self,
        bucket: &BucketName,
        filename: &str,
        size: u64,
        content: Vec<u8>,
    ) -> StorageResult<()> {
        let result = self
            .store
            .put_file(bucket, filename, size, content)
            .await
            .map_err(|err| err.context("put_file", bucket.as_str(), Some(filename)));
        self.invalidate(bucket);
        result
    }

    pub async fn get_file(
        &self,
        bucket: &BucketName,
        filename: &str,
    ) -> StorageResult<Vec<u8>> {
        self.store
            .get_file(bucket, filename)
            .await
            .map_err(|err| err.context("get_file", bucket.as_str(), Some(filename)))
    }

    pub async fn delete_file(
        &self,
        bucket: &BucketName,
        filename: &str,
    ) -> StorageResult<()> {
        let result = self
            .store
            .delete_file(bucket, filename)
            .await
            .map_err(|err| {
                err.context("delete_file", bucket.as_str(), Some(filename))
            });
        self.invalidate(bucket);
        result
    }

    pub async fn create_bucket(&self, bucket: &BucketName) -> StorageResult<()> {
        let result = self
            .store
            .create_bucket(bucket)
            .await
            .map_err(|err| err.context("create_bucket", bucket.as_str(), None));
        self.invalidate(bucket);
        result
    }

    pub async fn delete_bucket(&self, bucket: &BucketName) -> StorageResult<()> {
        let result = self
            .store
            .delete_bucket(bucket)
            .await
            .map_err(|err| err.context("delete_bucket", bucket.as_str(), None));
        self.invalidate(bucket);
        result
    }

    pub async fn bucket_exists(&self, bucket: &BucketName) -> StorageResult<bool> {
        self.store
            .bucket_exists(bucket)
            .await
            .map_err(|err| err.context("bucket_exists", bucket.as_str(), None))
    }

    /// Drop the cached listing for `bucket`.
    pub fn invalidate(&self, bucket: &BucketName) {
        if self.buckets.remove(bucket).is_some() {
            self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!(bucket = %bucket, "bucket listing invalidated");
        }
    }

    /// Remove every slot whose listing is expired or absent and that is
    /// not locked by an in-flight fetch. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let candidates: Vec<(BucketName, Arc<Mutex<BucketSlot>>)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut evicted = 0;
        for (bucket, slot) in candidates {
            let stale = match slot.try_lock() {
                Ok(guard) => guard.is_stale(now),
                Err(_) => false,
            };
            if stale
                && self
                    .buckets
                    .remove_if(&bucket, |_, current| Arc::ptr_eq(current, &slot))
                    .is_some()
            {
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.counters
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, remaining = self.buckets.len(), "swept bucket listings");
        }
        evicted
    }
}

impl<S> StorageCache<S>
where
    S: ObjectStore + ?Sized + 'static,
{
    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until
    /// `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        if interval.is_zero() {
            warn!("cache sweep interval is zero; sweeper not started");
            return tokio::spawn(async {});
        }
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(
                tokio::time::MissedTickBehavior::Delay,
            );
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("storage cache sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else {
                            break;
                        };
                        cache.sweep_expired();
                    }
                }
            }
        })
    }
}
