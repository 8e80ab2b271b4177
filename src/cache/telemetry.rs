//! Cache Telemetry Module
//!
//! Per-instance prometheus counters and the collector that exports them
//! together with the current cache size.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

const NAMESPACE: &str = "process_cache";

// == Cache Telemetry ==
/// Counters owned by one cache instance.
///
/// Cloning shares the underlying counters.
#[derive(Clone)]
pub struct CacheTelemetry {
    cache_evicts: IntCounter,
    events_dropped: IntCounter,
    events_skipped: IntCounter,
    lookup_hits: IntCounter,
    lookup_misses: IntCounter,
    lookups: IntCounterVec,
}

impl CacheTelemetry {
    // == Constructor ==
    pub fn new() -> Result<Self> {
        let lookups = IntCounterVec::new(
            Opts::new("lookups", "Counter measuring process cache lookups by outcome")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;

        Ok(Self {
            cache_evicts: IntCounter::with_opts(
                Opts::new(
                    "cache_evicts",
                    "Counter measuring the number of evictions in the process cache",
                )
                .namespace(NAMESPACE),
            )?,
            events_dropped: IntCounter::with_opts(
                Opts::new(
                    "events_dropped",
                    "Counter measuring the number of dropped process events",
                )
                .namespace(NAMESPACE),
            )?,
            events_skipped: IntCounter::with_opts(
                Opts::new(
                    "events_skipped",
                    "Counter measuring the number of skipped process events",
                )
                .namespace(NAMESPACE),
            )?,
            lookup_hits: lookups.with_label_values(&["hit"]),
            lookup_misses: lookups.with_label_values(&["miss"]),
            lookups,
        })
    }

    pub fn record_evictions(&self, count: u64) {
        self.cache_evicts.inc_by(count);
    }

    pub fn record_dropped(&self) {
        self.events_dropped.inc();
    }

    pub fn record_skipped(&self) {
        self.events_skipped.inc();
    }

    pub fn record_hit(&self) {
        self.lookup_hits.inc();
    }

    pub fn record_miss(&self) {
        self.lookup_misses.inc();
    }

    /// Current counter values alongside the given cache length.
    pub fn snapshot(&self, cache_length: usize) -> TelemetrySnapshot {
        TelemetrySnapshot {
            cache_length,
            cache_evicts: self.cache_evicts.get(),
            events_dropped: self.events_dropped.get(),
            events_skipped: self.events_skipped.get(),
            lookup_hits: self.lookup_hits.get(),
            lookup_misses: self.lookup_misses.get(),
        }
    }

    /// Registers a collector exporting these counters and a length gauge
    /// fed by `length` at scrape time.
    ///
    /// The collector stays registered until the returned guard is dropped.
    pub fn register<F>(&self, registry: &Registry, length: F) -> Result<MetricsRegistration>
    where
        F: Fn() -> usize + Send + Sync + 'static,
    {
        let collector = CacheCollector {
            telemetry: self.clone(),
            cache_length: IntGauge::with_opts(
                Opts::new(
                    "cache_length",
                    "Gauge measuring the current size of the process cache",
                )
                .namespace(NAMESPACE),
            )?,
            length: Arc::new(length),
        };
        registry.register(Box::new(collector.clone()))?;
        Ok(MetricsRegistration {
            registry: registry.clone(),
            collector,
        })
    }
}

// == Metrics Registration ==
/// Keeps one cache's collector in a registry; unregisters it on drop.
pub struct MetricsRegistration {
    registry: Registry,
    collector: CacheCollector,
}

impl Drop for MetricsRegistration {
    fn drop(&mut self) {
        if let Err(err) = self.registry.unregister(Box::new(self.collector.clone())) {
            debug!("Failed to unregister process cache collector: {}", err);
        }
    }
}

// == Cache Collector ==
/// Describe/collect adapter between one cache and a prometheus registry.
///
/// Clones share counters and gauge, so a clone unregisters the original.
#[derive(Clone)]
struct CacheCollector {
    telemetry: CacheTelemetry,
    cache_length: IntGauge,
    length: Arc<dyn Fn() -> usize + Send + Sync>,
}

impl Collector for CacheCollector {
    fn desc(&self) -> Vec<&Desc> {
        let t = &self.telemetry;
        let mut descs = self.cache_length.desc();
        descs.extend(t.cache_evicts.desc());
        descs.extend(t.events_dropped.desc());
        descs.extend(t.events_skipped.desc());
        descs.extend(t.lookups.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.cache_length.set((self.length)() as i64);

        let t = &self.telemetry;
        let mut families = self.cache_length.collect();
        families.extend(t.cache_evicts.collect());
        families.extend(t.events_dropped.collect());
        families.extend(t.events_skipped.collect());
        families.extend(t.lookups.collect());
        families
    }
}

// == Telemetry Snapshot ==
/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    /// Current number of entries in the cache
    pub cache_length: usize,
    /// Entries removed to make room (capacity or per-pid list pressure)
    pub cache_evicts: u64,
    /// Events dropped because the ingestion queue was full
    pub events_dropped: u64,
    /// Events discarded for carrying neither tags nor a container id
    pub events_skipped: u64,
    /// Lookups that found a process
    pub lookup_hits: u64,
    /// Lookups that found nothing
    pub lookup_misses: u64,
}

impl TelemetrySnapshot {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookup_hits + self.lookup_misses;
        if total == 0 {
            0.0
        } else {
            self.lookup_hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_telemetry_new_is_zeroed() {
        let telemetry = CacheTelemetry::new().unwrap();
        assert_eq!(telemetry.snapshot(0), TelemetrySnapshot::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let telemetry = CacheTelemetry::new().unwrap();
        telemetry.record_evictions(2);
        telemetry.record_dropped();
        telemetry.record_skipped();
        telemetry.record_skipped();
        telemetry.record_hit();
        telemetry.record_miss();

        let snap = telemetry.snapshot(5);
        assert_eq!(snap.cache_length, 5);
        assert_eq!(snap.cache_evicts, 2);
        assert_eq!(snap.events_dropped, 1);
        assert_eq!(snap.events_skipped, 2);
        assert_eq!(snap.lookup_hits, 1);
        assert_eq!(snap.lookup_misses, 1);
    }

    #[test]
    fn test_hit_rate() {
        let mut snap = TelemetrySnapshot::default();
        assert_eq!(snap.hit_rate(), 0.0);

        snap.lookup_hits = 3;
        snap.lookup_misses = 1;
        assert_eq!(snap.hit_rate(), 0.75);
    }

    #[test]
    fn test_clones_share_counters() {
        let telemetry = CacheTelemetry::new().unwrap();
        let clone = telemetry.clone();
        clone.record_dropped();
        assert_eq!(telemetry.snapshot(0).events_dropped, 1);
    }

    #[test]
    fn test_collector_exports_gauge_and_counters() {
        let registry = Registry::new();
        let telemetry = CacheTelemetry::new().unwrap();
        let length = Arc::new(AtomicUsize::new(0));

        let reader = length.clone();
        let _registration = telemetry
            .register(&registry, move || reader.load(Ordering::Relaxed))
            .unwrap();

        length.store(7, Ordering::Relaxed);
        telemetry.record_evictions(1);

        let families = registry.gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"process_cache_cache_length"));
        assert!(names.contains(&"process_cache_cache_evicts"));
        assert!(names.contains(&"process_cache_events_dropped"));
        assert!(names.contains(&"process_cache_events_skipped"));

        let gauge = families
            .iter()
            .find(|f| f.get_name() == "process_cache_cache_length")
            .unwrap();
        assert_eq!(gauge.get_metric()[0].get_gauge().get_value(), 7.0);

        let evicts = families
            .iter()
            .find(|f| f.get_name() == "process_cache_cache_evicts")
            .unwrap();
        assert_eq!(evicts.get_metric()[0].get_counter().get_value(), 1.0);
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        let telemetry = CacheTelemetry::new().unwrap();
        let _first = telemetry.register(&registry, || 0).unwrap();
        assert!(telemetry.register(&registry, || 0).is_err());
    }

    #[test]
    fn test_dropped_registration_leaves_registry() {
        let registry = Registry::new();
        let telemetry = CacheTelemetry::new().unwrap();
        let registration = telemetry.register(&registry, || 3).unwrap();
        assert!(!registry.gather().is_empty());

        drop(registration);
        assert!(registry.gather().is_empty());

        // A fresh instance can take its place
        let replacement = CacheTelemetry::new().unwrap();
        let _registration = replacement.register(&registry, || 0).unwrap();
        assert!(registry
            .gather()
            .iter()
            .any(|f| f.get_name() == "process_cache_cache_length"));
    }
}
