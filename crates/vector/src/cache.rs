use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use visearch_common::{AppConfig, Result, VisearchError};

use crate::store::CatalogStore;
use crate::types::CatalogSnapshot;

/// Catalog cache policy
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum snapshot age before a refetch
    pub ttl: Duration,

    /// Serve the previous snapshot when a refetch fails
    pub fallback_to_stale: bool,

    /// Upper bound on a single store fetch
    pub fetch_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            fallback_to_stale: true,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            ttl: config.catalog_ttl(),
            fallback_to_stale: config.catalog_fallback_to_stale,
            fetch_timeout: config.catalog_fetch_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

/// Point-in-time view of the cache, served by the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub state: CacheState,
    pub source: String,
    pub item_count: usize,
    pub embedded_count: usize,
    pub dimension: Option<usize>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age_secs: Option<u64>,
    pub ttl_secs: u64,
    pub fallback_to_stale: bool,
    pub fetch_count: u64,
    pub failed_fetch_count: u64,
}

/// Whole-catalog snapshot cache with time-based invalidation
///
/// Snapshots are immutable and published by replacing one `Arc`, so readers
/// never observe a half-built catalog. Refreshes go through a gate: callers
/// that queue behind an in-flight fetch reuse its result instead of issuing
/// their own.
pub struct CatalogCache {
    store: Arc<dyn CatalogStore>,
    config: CacheConfig,
    current: RwLock<Option<Arc<CatalogSnapshot>>>,
    refresh_gate: Mutex<()>,
    /// Bumped by every `invalidate`
    invalidations: AtomicU64,
    /// Highest invalidation generation a published snapshot has covered
    covered_invalidations: AtomicU64,
    fetch_count: AtomicU64,
    failed_fetch_count: AtomicU64,
}

impl CatalogCache {
    pub fn new(store: Arc<dyn CatalogStore>, config: CacheConfig) -> Self {
        info!(
            "Catalog cache initialized - source={}, ttl={:?}, fallback_to_stale={}",
            store.describe(),
            config.ttl,
            config.fallback_to_stale
        );

        Self {
            store,
            config,
            current: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            invalidations: AtomicU64::new(0),
            covered_invalidations: AtomicU64::new(0),
            fetch_count: AtomicU64::new(0),
            failed_fetch_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current snapshot, refetching first when missing or stale
    pub async fn get_snapshot(&self) -> Result<Arc<CatalogSnapshot>> {
        if let Some(snapshot) = self.fresh_snapshot().await {
            return Ok(snapshot);
        }

        let _gate = self.refresh_gate.lock().await;

        // another caller may have refreshed while we waited on the gate
        if let Some(snapshot) = self.fresh_snapshot().await {
            debug!("Catalog refreshed by a concurrent caller");
            return Ok(snapshot);
        }

        match self.fetch_and_publish().await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => self.fall_back(err).await,
        }
    }

    /// Refetch now regardless of age; failures are always surfaced
    pub async fn refresh(&self) -> Result<Arc<CatalogSnapshot>> {
        let _gate = self.refresh_gate.lock().await;
        self.fetch_and_publish().await
    }

    /// Force the next `get_snapshot` to refetch; the current snapshot stays
    /// available as a fallback
    pub fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        info!("Catalog cache invalidated");
    }

    pub async fn stats(&self) -> CacheStats {
        let current = self.current.read().await.clone();
        let state = self.state_of(current.as_deref());

        CacheStats {
            state,
            source: self.store.describe(),
            item_count: current.as_ref().map_or(0, |s| s.len()),
            embedded_count: current.as_ref().map_or(0, |s| s.embedded_count()),
            dimension: current.as_ref().and_then(|s| s.dimension()),
            fetched_at: current.as_ref().map(|s| s.fetched_at()),
            age_secs: current.as_ref().map(|s| s.age().as_secs()),
            ttl_secs: self.config.ttl.as_secs(),
            fallback_to_stale: self.config.fallback_to_stale,
            fetch_count: self.fetch_count.load(Ordering::SeqCst),
            failed_fetch_count: self.failed_fetch_count.load(Ordering::SeqCst),
        }
    }

    fn state_of(&self, snapshot: Option<&CatalogSnapshot>) -> CacheState {
        match snapshot {
            None => CacheState::Empty,
            Some(s) if self.is_invalidated() || s.is_stale(self.config.ttl) => CacheState::Stale,
            Some(_) => CacheState::Fresh,
        }
    }

    fn is_invalidated(&self) -> bool {
        self.invalidations.load(Ordering::SeqCst) > self.covered_invalidations.load(Ordering::SeqCst)
    }

    async fn fresh_snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        let current = self.current.read().await;
        match current.as_deref() {
            Some(snapshot) if self.state_of(Some(snapshot)) == CacheState::Fresh => (*current).clone(),
            _ => None,
        }
    }

    /// One full store read, published only if complete
    async fn fetch_and_publish(&self) -> Result<Arc<CatalogSnapshot>> {
        let started = Instant::now();
        let source = self.store.describe();
        // an invalidate() landing mid-fetch must survive this publish
        let generation = self.invalidations.load(Ordering::SeqCst);

        let items = match tokio::time::timeout(self.config.fetch_timeout, self.store.fetch_all()).await
        {
            Ok(Ok(items)) => items,
            Ok(Err(err)) => {
                self.failed_fetch_count.fetch_add(1, Ordering::SeqCst);
                let detail = match err {
                    VisearchError::CatalogUnavailable(msg) => msg,
                    other => other.to_string(),
                };
                return Err(VisearchError::catalog_unavailable(format!(
                    "fetch from {} failed: {}",
                    source, detail
                )));
            }
            Err(_) => {
                self.failed_fetch_count.fetch_add(1, Ordering::SeqCst);
                return Err(VisearchError::catalog_unavailable(format!(
                    "fetch from {} timed out after {:?}",
                    source, self.config.fetch_timeout
                )));
            }
        };

        let snapshot = Arc::new(CatalogSnapshot::new(items));
        *self.current.write().await = Some(Arc::clone(&snapshot));
        self.covered_invalidations.fetch_max(generation, Ordering::SeqCst);
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        info!(
            "Catalog snapshot refreshed - {} items ({} with embeddings) from {} in {:?}",
            snapshot.len(),
            snapshot.embedded_count(),
            source,
            started.elapsed()
        );
        Ok(snapshot)
    }

    async fn fall_back(&self, err: VisearchError) -> Result<Arc<CatalogSnapshot>> {
        if self.config.fallback_to_stale {
            if let Some(previous) = self.current.read().await.clone() {
                warn!(
                    "{}; serving stale snapshot ({} items, age {:?})",
                    err,
                    previous.len(),
                    previous.age()
                );
                return Ok(previous);
            }
        }

        warn!("{}", err);
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CatalogItem;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    /// Store that counts reads and can be told to fail or stall
    struct ScriptedStore {
        items: std::sync::Mutex<Vec<CatalogItem>>,
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
    }

    impl ScriptedStore {
        fn new(items: Vec<CatalogItem>) -> Self {
            Self {
                items: std::sync::Mutex::new(items),
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn set_items(&self, items: Vec<CatalogItem>) {
            *self.items.lock().unwrap() = items;
        }
    }

    #[async_trait]
    impl CatalogStore for ScriptedStore {
        async fn fetch_all(&self) -> Result<Vec<CatalogItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(VisearchError::network("connection refused"));
            }
            Ok(self.items.lock().unwrap().clone())
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn catalog(ids: &[&str]) -> Vec<CatalogItem> {
        ids.iter()
            .map(|id| CatalogItem::new(*id, *id, "u", Some(vec![1.0, 0.0])))
            .collect()
    }

    fn cache_with(store: Arc<ScriptedStore>, fallback_to_stale: bool) -> CatalogCache {
        CatalogCache::new(
            store,
            CacheConfig {
                ttl: Duration::from_secs(300),
                fallback_to_stale,
                fetch_timeout: Duration::from_secs(30),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_fetch_within_window() {
        let store = Arc::new(ScriptedStore::new(catalog(&["a", "b"])));
        let cache = cache_with(Arc::clone(&store), true);

        for _ in 0..5 {
            let snapshot = cache.get_snapshot().await.unwrap();
            assert_eq!(snapshot.len(), 2);
            tokio::time::advance(Duration::from_secs(30)).await;
        }

        assert_eq!(store.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_after_window() {
        let store = Arc::new(ScriptedStore::new(catalog(&["a"])));
        let cache = cache_with(Arc::clone(&store), true);

        cache.get_snapshot().await.unwrap();
        store.set_items(catalog(&["a", "b", "c"]));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get_snapshot().await.unwrap().len(), 1);
        assert_eq!(store.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.stats().await.state, CacheState::Stale);
        assert_eq!(cache.get_snapshot().await.unwrap().len(), 3);
        assert_eq!(store.calls(), 2);
        assert_eq!(cache.stats().await.state, CacheState::Fresh);
    }

    #[tokio::test]
    async fn test_empty_cache_failure_is_unavailable() {
        let store = Arc::new(ScriptedStore::new(Vec::new()));
        store.set_failing(true);
        let cache = cache_with(Arc::clone(&store), true);

        let err = cache.get_snapshot().await.unwrap_err();
        assert!(matches!(err, VisearchError::CatalogUnavailable(_)));
        assert_eq!(cache.stats().await.state, CacheState::Empty);
        assert_eq!(cache.stats().await.failed_fetch_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fallback_when_enabled() {
        let store = Arc::new(ScriptedStore::new(catalog(&["a", "b"])));
        let cache = cache_with(Arc::clone(&store), true);
        cache.get_snapshot().await.unwrap();

        store.set_failing(true);
        tokio::time::advance(Duration::from_secs(301)).await;

        let snapshot = cache.get_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.calls(), 2);

        // still stale, so the next call tries the store again
        cache.get_snapshot().await.unwrap();
        assert_eq!(store.calls(), 3);
        assert_eq!(cache.stats().await.state, CacheState::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_when_fallback_disabled() {
        let store = Arc::new(ScriptedStore::new(catalog(&["a", "b"])));
        let cache = cache_with(Arc::clone(&store), false);
        cache.get_snapshot().await.unwrap();

        store.set_failing(true);
        tokio::time::advance(Duration::from_secs(301)).await;

        let err = cache.get_snapshot().await.unwrap_err();
        assert!(matches!(err, VisearchError::CatalogUnavailable(_)));

        // the previous snapshot is kept, not discarded
        let stats = cache.stats().await;
        assert_eq!(stats.item_count, 2);
        assert_eq!(stats.state, CacheState::Stale);

        store.set_failing(false);
        assert_eq!(cache.get_snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_coalesce() {
        let store = Arc::new(
            ScriptedStore::new(catalog(&["a", "b", "c"])).with_delay(Duration::from_millis(200)),
        );
        let cache = Arc::new(cache_with(Arc::clone(&store), true));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_snapshot().await.map(|s| s.len()) })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 3);
        }
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_is_unavailable() {
        let store = Arc::new(ScriptedStore::new(catalog(&["a"])).with_delay(Duration::from_secs(3600)));
        let cache = cache_with(Arc::clone(&store), true);

        let err = cache.get_snapshot().await.unwrap_err();
        match err {
            VisearchError::CatalogUnavailable(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_forced_refresh_and_invalidate() {
        let store = Arc::new(ScriptedStore::new(catalog(&["a"])));
        let cache = cache_with(Arc::clone(&store), true);
        cache.get_snapshot().await.unwrap();

        store.set_items(catalog(&["a", "b"]));
        assert_eq!(cache.refresh().await.unwrap().len(), 2);
        assert_eq!(store.calls(), 2);

        cache.invalidate();
        assert_eq!(cache.stats().await.state, CacheState::Stale);
        cache.get_snapshot().await.unwrap();
        assert_eq!(store.calls(), 3);
        assert_eq!(cache.stats().await.state, CacheState::Fresh);

        // forced refresh surfaces failures even with fallback enabled
        store.set_failing(true);
        assert!(cache.refresh().await.is_err());
        assert_eq!(cache.get_snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_held_by_reader_survives_swap() {
        let store = Arc::new(ScriptedStore::new(catalog(&["a"])));
        let cache = cache_with(Arc::clone(&store), true);

        let held = cache.get_snapshot().await.unwrap();
        store.set_items(catalog(&["x", "y"]));
        let fresh = cache.refresh().await.unwrap();

        assert_eq!(held.items()[0].id, "a");
        assert_eq!(fresh.len(), 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = Arc::new(ScriptedStore::new(vec![
            CatalogItem::new("a", "A", "u", Some(vec![1.0, 0.0, 0.0])),
            CatalogItem::new("b", "B", "u", None),
        ]));
        let cache = cache_with(Arc::clone(&store), true);

        let empty = cache.stats().await;
        assert_eq!(empty.state, CacheState::Empty);
        assert!(empty.fetched_at.is_none());

        cache.get_snapshot().await.unwrap();
        let stats = cache.stats().await;
        assert_eq!(stats.item_count, 2);
        assert_eq!(stats.embedded_count, 1);
        assert_eq!(stats.dimension, Some(3));
        assert_eq!(stats.fetch_count, 1);
        assert_eq!(stats.source, "scripted");

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["state"], "fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_fetch_is_not_lost() {
        let store = Arc::new(ScriptedStore::new(catalog(&["a"])).with_delay(Duration::from_millis(200)));
        let cache = Arc::new(cache_with(Arc::clone(&store), true));

        let in_flight = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.refresh().await.map(|s| s.len()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.calls(), 1);

        cache.invalidate();

        assert_eq!(in_flight.await.unwrap().unwrap(), 1);
        assert_eq!(cache.stats().await.state, CacheState::Stale);

        cache.get_snapshot().await.unwrap();
        assert_eq!(store.calls(), 2);
        assert_eq!(cache.stats().await.state, CacheState::Fresh);
    }
}
