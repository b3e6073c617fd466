//! Read-through cache for whole-collection reads (the catalog listing).
//!
//! There is no expiry: the value lives until `invalidate_all`. Every
//! invalidation bumps a generation counter, and a load only populates the cache
//! if no invalidation happened while it was running, so a slow loader cannot
//! put pre-write data back after a write.

use std::future::Future;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

#[derive(Debug)]
struct Slot<V> {
    value: Option<V>,
    generation: u64,
}

/// Hit/miss counters, mostly for tests and debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct ReadThroughCache<V> {
    name: &'static str,
    slot: RwLock<Slot<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ReadThroughCache<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: RwLock::new(Slot {
                value: None,
                generation: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached value, or the result of `loader` (cached on success).
    ///
    /// Loader errors are returned as-is and leave the cache empty.
    pub async fn get_or_load<F, Fut, E>(&self, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let generation = {
            let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
            if let Some(value) = &slot.value {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, "cache hit");
                return Ok(value.clone());
            }
            slot.generation
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(cache = self.name, "cache miss, loading");
        let loaded = loader().await?;

        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if slot.generation == generation {
            slot.value = Some(loaded.clone());
        } else {
            debug!(cache = self.name, "discarding load that raced an invalidation");
        }
        Ok(loaded)
    }

    pub fn invalidate_all(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.value = None;
        slot.generation += 1;
        debug!(cache = self.name, generation = slot.generation, "cache invalidated");
    }

    pub fn is_warm(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .value
            .is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = ReadThroughCache::new("test");
        let loads = AtomicUsize::new(0);
        let counter = &loads;
        let load = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(vec![1, 2, 3])
        };

        assert_eq!(cache.get_or_load(load).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(cache.get_or_load(load).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn invalidate_forces_a_reload() {
        let cache = ReadThroughCache::new("test");
        cache
            .get_or_load(|| async { Ok::<_, Infallible>("old") })
            .await
            .unwrap();
        cache.invalidate_all();
        assert!(!cache.is_warm());

        let v = cache
            .get_or_load(|| async { Ok::<_, Infallible>("new") })
            .await
            .unwrap();
        assert_eq!(v, "new");
        assert!(cache.is_warm());
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache: ReadThroughCache<u32> = ReadThroughCache::new("test");
        let err = cache.get_or_load(|| async { Err("boom") }).await.unwrap_err();
        assert_eq!(err, "boom");
        assert!(!cache.is_warm());
    }

    #[tokio::test]
    async fn load_that_raced_an_invalidation_is_not_stored() {
        let cache = Arc::new(ReadThroughCache::new("test"));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let slow = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_load(move || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, Infallible>("stale")
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        cache.invalidate_all();
        release_tx.send(()).unwrap();

        // The slow reader still gets its own result...
        assert_eq!(slow.await.unwrap().unwrap(), "stale");
        // ...but it was not kept.
        assert!(!cache.is_warm());
    }
}
