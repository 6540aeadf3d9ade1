//! In-process reference cache backed by DashMap for lock-free concurrent access.
//! Keyed by `(event_id, window)` so repeated analyses of the same spot skip
//! recomputing baselines and refetching observed traffic.

use dashmap::DashMap;
use spotlift_core::config::CacheConfig;
use spotlift_core::types::{WindowMetrics, WindowReference};
use spotlift_core::TimeWindow;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Baseline and observed aggregates for one event window.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedWindow {
    pub reference: WindowReference,
    pub observed: WindowMetrics,
}

struct CacheEntry {
    window: CachedWindow,
    inserted_at: Instant,
}

type CacheKey = (String, TimeWindow);

#[derive(Clone)]
pub struct ReferenceCache {
    store: Arc<DashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ReferenceCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_ttl(Duration::from_secs(config.ttl_secs), config.max_entries)
    }

    pub fn with_ttl(ttl: Duration, max_entries: usize) -> Self {
        Self {
            store: Arc::new(DashMap::with_capacity(max_entries.min(1024))),
            ttl,
            max_entries,
        }
    }

    /// Cached window, or `None` if expired or missing.
    pub fn get(&self, event_id: &str, window: TimeWindow) -> Option<CachedWindow> {
        let key = (event_id.to_string(), window);
        let Some(entry) = self.store.get(&key) else {
            metrics::counter!("engine.cache_misses").increment(1);
            return None;
        };
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.store.remove(&key);
            metrics::counter!("engine.cache_misses").increment(1);
            return None;
        }
        metrics::counter!("engine.cache_hits").increment(1);
        Some(entry.window.clone())
    }

    pub fn put(&self, event_id: &str, window: TimeWindow, cached: CachedWindow) {
        let key = (event_id.to_string(), window);
        if self.store.len() >= self.max_entries && !self.store.contains_key(&key) {
            // Make room from expired entries before giving up on the insert.
            if self.evict_expired() == 0 {
                return;
            }
        }
        self.store.insert(
            key,
            CacheEntry {
                window: cached,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        self.store
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl std::fmt::Debug for ReferenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCache")
            .field("entries", &self.store.len())
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}
