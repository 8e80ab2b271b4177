//! Process Correlator Module
//!
//! Public entry points of the process cache: non-blocking submission,
//! point-in-time lookup, diagnostics and shutdown. A disabled variant answers
//! the same calls without doing anything.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use prometheus::Registry;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::cache::{
    current_timestamp_ms, CacheTelemetry, MetricsRegistration, ProcessEvent, ProcessKey,
    ProcessRecord, ProcessTable, TelemetrySnapshot,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_ingest_worker, spawn_trim_task, trim_expired};

/// Snapshot of the per-pid index: pid -> variants in index order.
pub type ProcessDump = BTreeMap<u32, Vec<Arc<ProcessRecord>>>;

/// What happened to a submitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Handed to the ingestion worker
    Queued,
    /// Carried neither tags nor a container id
    Skipped,
    /// The ingestion queue was full
    Dropped,
    /// The cache has been stopped
    Stopped,
    /// Correlation is turned off
    Disabled,
}

impl SubmitOutcome {
    pub fn is_queued(self) -> bool {
        self == SubmitOutcome::Queued
    }
}

// == Process Correlator ==
/// Capability shared by the enabled and disabled caches.
///
/// Every method is safe to call from any thread at any time, including after
/// `stop`. Records handed out are shared with the cache and read-only.
pub trait ProcessCorrelator: Send + Sync {
    /// Offers a process event for ingestion. Never blocks.
    fn submit(&self, event: ProcessEvent) -> SubmitOutcome;

    /// Returns the instance of `pid` that was running at `timestamp`.
    fn get(&self, pid: u32, timestamp: i64) -> Option<Arc<ProcessRecord>>;

    /// Copies the per-pid index for diagnostics.
    fn dump(&self) -> ProcessDump;

    /// Removes expired entries now. Returns the number removed.
    fn trim(&self) -> usize;

    /// Signals the background tasks to exit. Idempotent.
    fn stop(&self);

    /// Number of entries in the store.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counter values.
    fn telemetry(&self) -> TelemetrySnapshot;

    fn is_enabled(&self) -> bool;
}

/// Builds the correlator selected by `config.enabled`.
pub fn build(config: &Config, registry: &Registry) -> Result<Arc<dyn ProcessCorrelator>> {
    if !config.enabled {
        info!("Process cache disabled");
        return Ok(Arc::new(DisabledCache));
    }
    Ok(Arc::new(ProcessCache::new(config, registry)?))
}

// == Process Cache ==
/// Enabled process cache.
///
/// Producers enqueue into a bounded channel; a single worker commits into the
/// table. Readers, the trim task and the metrics collector share the table
/// lock with that worker.
pub struct ProcessCache {
    table: Arc<Mutex<ProcessTable>>,
    telemetry: CacheTelemetry,
    queue: mpsc::Sender<ProcessEvent>,
    stopped: AtomicBool,
    cancel: CancellationToken,
    // Unregisters the collector when the cache is dropped
    _metrics: MetricsRegistration,
}

impl ProcessCache {
    // == Constructor ==
    /// Creates the cache, registers its collector in `registry` and spawns the
    /// ingestion worker and trim task on the current tokio runtime.
    pub fn new(config: &Config, registry: &Registry) -> Result<Self> {
        config.validate()?;
        Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let table = Arc::new(Mutex::new(ProcessTable::new(
            config.capacity,
            config.max_per_pid_variants,
            config.entry_ttl,
        )?));

        let telemetry = CacheTelemetry::new()?;
        let reader: Weak<Mutex<ProcessTable>> = Arc::downgrade(&table);
        let metrics = telemetry.register(registry, move || {
            reader.upgrade().map_or(0, |table| table.lock().len())
        })?;

        let (queue, receiver) = mpsc::channel(config.queue_length);
        let cancel = CancellationToken::new();

        spawn_ingest_worker(receiver, table.clone(), telemetry.clone(), cancel.child_token());
        spawn_trim_task(table.clone(), config.trim_interval, cancel.child_token());

        info!(
            capacity = config.capacity,
            queue_length = config.queue_length,
            max_per_pid_variants = config.max_per_pid_variants,
            "Process cache started"
        );

        Ok(Self {
            table,
            telemetry,
            queue,
            stopped: AtomicBool::new(false),
            cancel,
            _metrics: metrics,
        })
    }

    /// Keys currently held by the store.
    pub fn keys(&self) -> Vec<ProcessKey> {
        self.table.lock().keys()
    }

    /// Checks the index/store invariants under the lock.
    pub fn is_consistent(&self) -> bool {
        self.table.lock().is_consistent()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl ProcessCorrelator for ProcessCache {
    fn submit(&self, event: ProcessEvent) -> SubmitOutcome {
        if self.is_stopped() {
            return SubmitOutcome::Stopped;
        }

        if !event.is_correlatable() {
            self.telemetry.record_skipped();
            return SubmitOutcome::Skipped;
        }

        match self.queue.try_send(event) {
            Ok(()) => SubmitOutcome::Queued,
            Err(TrySendError::Full(event)) => {
                trace!(pid = event.pid, "process cache queue full, dropping event");
                self.telemetry.record_dropped();
                SubmitOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => SubmitOutcome::Stopped,
        }
    }

    fn get(&self, pid: u32, timestamp: i64) -> Option<Arc<ProcessRecord>> {
        let found = self
            .table
            .lock()
            .get(pid, timestamp, current_timestamp_ms());

        match found {
            Some(_) => self.telemetry.record_hit(),
            None => self.telemetry.record_miss(),
        }
        found
    }

    fn dump(&self) -> ProcessDump {
        self.table.lock().dump()
    }

    fn trim(&self) -> usize {
        trim_expired(&self.table)
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            debug!("Process cache already stopped");
            return;
        }
        self.cancel.cancel();
        info!("Process cache stopped");
    }

    fn len(&self) -> usize {
        self.table.lock().len()
    }

    fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot(self.len())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

impl Drop for ProcessCache {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// == Disabled Cache ==
/// Stand-in used when correlation is turned off. Every call is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

impl ProcessCorrelator for DisabledCache {
    fn submit(&self, _event: ProcessEvent) -> SubmitOutcome {
        SubmitOutcome::Disabled
    }

    fn get(&self, _pid: u32, _timestamp: i64) -> Option<Arc<ProcessRecord>> {
        None
    }

    fn dump(&self) -> ProcessDump {
        ProcessDump::new()
    }

    fn trim(&self) -> usize {
        0
    }

    fn stop(&self) {}

    fn len(&self) -> usize {
        0
    }

    fn telemetry(&self) -> TelemetrySnapshot {
        TelemetrySnapshot::default()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            capacity: 16,
            queue_length: 8,
            ..Config::default()
        }
    }

    fn event(pid: u32, start_time: i64) -> ProcessEvent {
        ProcessEvent {
            pid,
            start_time,
            tags: vec!["service:web".to_string()],
            container_id: None,
        }
    }

    async fn wait_for_len(cache: &dyn ProcessCorrelator, len: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while cache.len() != len {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("ingestion did not catch up");
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = ProcessCache::new(&config(), &Registry::new());
        assert!(matches!(result, Err(CacheError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = Config {
            capacity: 0,
            ..config()
        };
        let result = ProcessCache::new(&config, &Registry::new());
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_same_registry_twice_fails() {
        let registry = Registry::new();
        let _first = ProcessCache::new(&config(), &registry).unwrap();
        let second = ProcessCache::new(&config(), &registry);
        assert!(matches!(second, Err(CacheError::Metrics(_))));
    }

    fn gauge_value(registry: &Registry) -> Option<f64> {
        registry
            .gather()
            .iter()
            .find(|f| f.get_name() == "process_cache_cache_length")
            .map(|f| f.get_metric()[0].get_gauge().get_value())
    }

    #[tokio::test]
    async fn test_dropped_cache_releases_registry() {
        let registry = Registry::new();
        let cache = ProcessCache::new(&config(), &registry).unwrap();
        cache.submit(event(1, 10));
        wait_for_len(&cache, 1).await;
        assert_eq!(gauge_value(&registry), Some(1.0));

        cache.stop();
        drop(cache);
        assert_eq!(gauge_value(&registry), None);

        let rebuilt = ProcessCache::new(&config(), &registry).unwrap();
        assert_eq!(gauge_value(&registry), Some(0.0));
        rebuilt.stop();
    }

    #[tokio::test]
    async fn test_submit_then_get() {
        let cache = ProcessCache::new(&config(), &Registry::new()).unwrap();

        assert_eq!(cache.submit(event(1, 10)), SubmitOutcome::Queued);
        assert_eq!(cache.submit(event(1, 20)), SubmitOutcome::Queued);
        wait_for_len(&cache, 2).await;

        assert_eq!(cache.get(1, 15).unwrap().start_time, 10);
        assert!(cache.get(1, 5).is_none());

        let snap = cache.telemetry();
        assert_eq!(snap.lookup_hits, 1);
        assert_eq!(snap.lookup_misses, 1);
        assert_eq!(snap.cache_length, 2);
    }

    #[tokio::test]
    async fn test_submit_skips_uncorrelatable_event() {
        let cache = ProcessCache::new(&config(), &Registry::new()).unwrap();
        let bare = ProcessEvent {
            pid: 1,
            start_time: 1,
            tags: vec![],
            container_id: None,
        };

        assert_eq!(cache.submit(bare), SubmitOutcome::Skipped);
        assert_eq!(cache.telemetry().events_skipped, 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_rejects_submissions() {
        let cache = ProcessCache::new(&config(), &Registry::new()).unwrap();

        cache.stop();
        cache.stop();

        assert!(cache.is_stopped());
        assert_eq!(cache.submit(event(1, 1)), SubmitOutcome::Stopped);
        // Reads still work on a stopped cache
        assert!(cache.get(1, 1).is_none());
        assert!(cache.dump().is_empty());
    }

    #[tokio::test]
    async fn test_build_disabled() {
        let config = Config {
            enabled: false,
            ..config()
        };
        let cache = build(&config, &Registry::new()).unwrap();

        assert!(!cache.is_enabled());
        assert_eq!(cache.submit(event(1, 1)), SubmitOutcome::Disabled);
        assert!(cache.get(1, 1).is_none());
        assert!(cache.dump().is_empty());
        assert_eq!(cache.trim(), 0);
        assert_eq!(cache.len(), 0);
        cache.stop();
        cache.stop();
    }

    #[test]
    fn test_build_disabled_needs_no_runtime() {
        let config = Config {
            enabled: false,
            ..config()
        };
        assert!(build(&config, &Registry::new()).is_ok());
    }

    #[tokio::test]
    async fn test_build_enabled() {
        let cache = build(&config(), &Registry::new()).unwrap();
        assert!(cache.is_enabled());
        cache.submit(event(3, 30));
        wait_for_len(cache.as_ref(), 1).await;
        assert_eq!(cache.dump()[&3][0].start_time, 30);
    }
}
