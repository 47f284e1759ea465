//! Cache metrics for observability

use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<CacheMetricsInner> = OnceLock::new();

struct CacheMetricsInner {
    hits: IntCounterVec,
    misses: IntCounterVec,
    writes: IntCounterVec,
    evictions: IntCounterVec,
}

impl CacheMetricsInner {
    fn new() -> Self {
        Self {
            hits: IntCounterVec::new(
                Opts::new("resource_cache_hits_total", "Total cache hits"),
                &["cache", "key"],
            )
            .expect("valid metric definition"),
            misses: IntCounterVec::new(
                Opts::new("resource_cache_misses_total", "Total cache misses"),
                &["cache", "key"],
            )
            .expect("valid metric definition"),
            writes: IntCounterVec::new(
                Opts::new("resource_cache_writes_total", "Total cache writes"),
                &["cache", "key"],
            )
            .expect("valid metric definition"),
            evictions: IntCounterVec::new(
                Opts::new(
                    "resource_cache_evictions_total",
                    "Total entries dropped after their TTL elapsed",
                ),
                &["cache", "key"],
            )
            .expect("valid metric definition"),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.hits.clone()))?;
        registry.register(Box::new(self.misses.clone()))?;
        registry.register(Box::new(self.writes.clone()))?;
        registry.register(Box::new(self.evictions.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static CacheMetricsInner {
    METRICS.get_or_init(CacheMetricsInner::new)
}

/// Prometheus counters shared by every cache in the process, labelled by
/// cache name and key
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    cache: &'static str,
}

impl CacheMetrics {
    pub fn new(cache: &'static str) -> Self {
        Self { cache }
    }

    /// Register metrics with a Prometheus registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_hit(&self, key: &str) {
        get_metrics()
            .hits
            .with_label_values(&[self.cache, key])
            .inc();
    }

    pub fn record_miss(&self, key: &str) {
        get_metrics()
            .misses
            .with_label_values(&[self.cache, key])
            .inc();
    }

    pub fn record_write(&self, key: &str) {
        get_metrics()
            .writes
            .with_label_values(&[self.cache, key])
            .inc();
    }

    pub fn record_eviction(&self, key: &str) {
        get_metrics()
            .evictions
            .with_label_values(&[self.cache, key])
            .inc();
    }
}
