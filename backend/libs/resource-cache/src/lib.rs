//! In-process read-through cache with TTL-based expiration
//!
//! Holds upstream resource collections for a fixed time-to-live:
//! - Lock-free concurrent access via DashMap
//! - Lazy expiry, evaluated on the next access (no background sweeper)
//! - Injectable clock so expiry can be tested without sleeping
//! - Prometheus metrics plus per-instance statistics

mod clock;
mod metrics;

pub use clock::{Clock, ManualClock, SystemClock};
pub use metrics::CacheMetrics;

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default TTL values (seconds)
pub mod ttl {
    pub const RESOURCE: u64 = 600; // 10 minutes
}

/// Cached entry with expiry metadata
#[derive(Debug, Clone)]
struct CachedEntry<V> {
    value: V,
    /// `None` when the TTL reaches past the clock's representable range
    expires_at: Option<Instant>,
}

impl<V> CachedEntry<V> {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
}

/// Key/value cache with a single TTL for every entry
///
/// Values are cloned out on every hit, so `V` is normally an `Arc` or another
/// cheap handle.
pub struct TtlCache<V> {
    name: &'static str,
    store: DashMap<String, CachedEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    counters: Counters,
    metrics: CacheMetrics,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache backed by the system clock
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self::with_clock(name, ttl, Arc::new(SystemClock))
    }

    /// Create a cache driven by the given clock
    pub fn with_clock(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        debug!(cache = name, ttl_secs = ttl.as_secs(), "Initializing TTL cache");

        Self {
            name,
            store: DashMap::new(),
            ttl,
            clock,
            counters: Counters::default(),
            metrics: CacheMetrics::new(name),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh value
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();

        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired(now) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_hit(key);
                debug!(cache = self.name, key = %key, "Cache hit");
                return Some(entry.value.clone());
            }
        }

        // Guard released above; remove_if re-checks so a concurrent refresh
        // is never dropped
        if self
            .store
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            self.metrics.record_eviction(key);
            debug!(cache = self.name, key = %key, "Cache evict (expired)");
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_miss(key);
        debug!(cache = self.name, key = %key, "Cache miss");
        None
    }

    /// Store a value, replacing any previous entry for the key
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let expires_at = self.clock.now().checked_add(self.ttl);

        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_write(&key);
        debug!(cache = self.name, key = %key, ttl_secs = self.ttl.as_secs(), "Cache set");

        self.store.insert(key, CachedEntry { value, expires_at });
    }

    /// Return the cached value or run `fetch` and cache its result
    ///
    /// Errors from `fetch` are returned unchanged and nothing is stored.
    /// Concurrent misses on the same key may each run `fetch`; the last
    /// writer wins.
    pub async fn get_or_try_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Drop a single entry; returns whether one was present
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.store.remove(key).is_some();
        if removed {
            debug!(cache = self.name, key = %key, "Cache invalidate");
        }
        removed
    }

    /// Drop every entry
    pub fn clear(&self) {
        let count = self.store.len();
        self.store.clear();
        debug!(cache = self.name, cleared_entries = count, "Cache clear");
    }

    /// Number of stored entries, expired ones included until next touched
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.store.len(),
            hit_count: self.counters.hits.load(Ordering::Relaxed),
            miss_count: self.counters.misses.load(Ordering::Relaxed),
            write_count: self.counters.writes.load(Ordering::Relaxed),
            eviction_count: self.counters.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Per-instance cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub write_count: u64,
    pub eviction_count: u64,
}

impl CacheStats {
    /// Hit rate percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            (self.hit_count as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn test_cache(clock: Arc<ManualClock>) -> TtlCache<Arc<Vec<u32>>> {
        TtlCache::with_clock("test", Duration::from_secs(ttl::RESOURCE), clock)
    }

    #[tokio::test]
    async fn test_hit_within_ttl_skips_fetch() {
        let clock = Arc::new(ManualClock::new());
        let cache = test_cache(clock.clone());
        let calls = AtomicUsize::new(0);

        let first: Result<_, ()> = cache
            .get_or_try_fetch("users", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(vec![1, 2, 3]))
            })
            .await;
        assert_eq!(*first.unwrap(), vec![1, 2, 3]);

        clock.advance(Duration::from_secs(599));

        let second: Result<_, ()> = cache
            .get_or_try_fetch("users", || async {
                panic!("Should not fetch on cache hit!");
            })
            .await;
        assert_eq!(*second.unwrap(), vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.write_count, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let clock = Arc::new(ManualClock::new());
        let cache = test_cache(clock.clone());

        let _: Result<_, ()> = cache
            .get_or_try_fetch("todos", || async { Ok(Arc::new(vec![1])) })
            .await;

        clock.advance(Duration::from_secs(600));

        let calls = AtomicUsize::new(0);
        let value: Result<_, ()> = cache
            .get_or_try_fetch("todos", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(vec![2]))
            })
            .await;

        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "Expired entry should trigger a fresh fetch"
        );
        assert_eq!(*value.unwrap(), vec![2]);
        assert_eq!(cache.stats().eviction_count, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let clock = Arc::new(ManualClock::new());
        let cache = test_cache(clock);

        let failed: Result<Arc<Vec<u32>>, &str> = cache
            .get_or_try_fetch("posts", || async { Err("upstream down") })
            .await;
        assert_eq!(failed.unwrap_err(), "upstream down");
        assert!(cache.is_empty());

        let recovered: Result<_, &str> = cache
            .get_or_try_fetch("posts", || async { Ok(Arc::new(vec![7])) })
            .await;
        assert_eq!(*recovered.unwrap(), vec![7]);
    }

    #[test]
    fn test_keys_are_independent() {
        let clock = Arc::new(ManualClock::new());
        let cache = test_cache(clock);

        cache.insert("users", Arc::new(vec![1]));
        cache.insert("todos", Arc::new(vec![2]));

        assert_eq!(*cache.get("users").unwrap(), vec![1]);
        assert_eq!(*cache.get("todos").unwrap(), vec![2]);
        assert!(cache.get("comments").is_none());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let clock = Arc::new(ManualClock::new());
        let cache = test_cache(clock);

        cache.insert("users", Arc::new(vec![1]));
        cache.insert("todos", Arc::new(vec![2]));

        assert!(cache.invalidate("users"));
        assert!(!cache.invalidate("users"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock("test", Duration::MAX, clock.clone());

        cache.insert("users", Arc::new(vec![1]));
        clock.advance(Duration::from_secs(ttl::RESOURCE * 1_000));

        assert_eq!(*cache.get("users").unwrap(), vec![1]);
        assert_eq!(cache.stats().eviction_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_all_see_a_complete_value() {
        const CALLERS: usize = 16;

        let cache = Arc::new(test_cache(Arc::new(ManualClock::new())));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_try_fetch("users", || async {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            Ok::<_, ()>(Arc::new((0..100).collect::<Vec<u32>>()))
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value.len(), 100);
            assert_eq!(value.last(), Some(&99));
        }

        let fetches = calls.load(Ordering::SeqCst);
        assert!((1..=CALLERS).contains(&fetches), "fetches = {fetches}");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            entries: 4,
            hit_count: 3,
            miss_count: 1,
            write_count: 1,
            eviction_count: 0,
        };
        assert!((stats.hit_rate() - 75.0).abs() < 0.01);

        let empty = CacheStats {
            entries: 0,
            hit_count: 0,
            miss_count: 0,
            write_count: 0,
            eviction_count: 0,
        };
        assert_eq!(empty.hit_rate(), 0.0);
    }
}
