//! Process Record Module
//!
//! Defines the incoming process event, the record held by the cache and its key.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

// == Process Key ==
/// Identity of a process instance: pids are reused, (pid, start time) is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessKey {
    pub pid: u32,
    pub start_time: i64,
}

impl ProcessKey {
    pub fn new(pid: u32, start_time: i64) -> Self {
        Self { pid, start_time }
    }
}

// == Process Event ==
/// A process lifecycle event as produced by the process monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEvent {
    /// Process identifier
    pub pid: u32,
    /// Start timestamp of this process instance
    pub start_time: i64,
    /// Tags attached to the process (service, env, version, ...)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Container the process runs in, if any
    #[serde(default)]
    pub container_id: Option<String>,
}

impl ProcessEvent {
    /// Returns true when the event carries anything worth correlating on.
    ///
    /// Events with neither tags nor a container id are skipped at ingestion.
    /// Any present container id counts, even an empty one.
    pub fn is_correlatable(&self) -> bool {
        !self.tags.is_empty() || self.container_id.is_some()
    }
}

// == Process Record ==
/// A committed process instance.
///
/// Records are shared (`Arc`) between the store, the per-pid index and
/// callers of lookups. Only the expiry is mutable; it is written under the
/// cache lock and may be read concurrently by holders of a snapshot.
#[derive(Debug)]
pub struct ProcessRecord {
    pub pid: u32,
    pub start_time: i64,
    pub tags: Vec<String>,
    pub container_id: Option<String>,
    /// Expiration timestamp (Unix milliseconds)
    expiry: AtomicI64,
}

impl ProcessRecord {
    // == Constructor ==
    /// Builds a record from an event, expiring at `expiry_ms`.
    pub fn from_event(event: ProcessEvent, expiry_ms: i64) -> Self {
        Self {
            pid: event.pid,
            start_time: event.start_time,
            tags: event.tags,
            container_id: event.container_id,
            expiry: AtomicI64::new(expiry_ms),
        }
    }

    pub fn key(&self) -> ProcessKey {
        ProcessKey::new(self.pid, self.start_time)
    }

    /// Expiration timestamp in Unix milliseconds.
    pub fn expiry(&self) -> i64 {
        self.expiry.load(Ordering::Relaxed)
    }

    /// Pushes the expiry to `now_ms + ttl`.
    pub fn extend_expiry(&self, now_ms: i64, ttl: Duration) {
        self.expiry
            .store(expiry_after(now_ms, ttl), Ordering::Relaxed);
    }

    // == Is Expired ==
    /// An entry is expired once `now_ms` is strictly past its expiry.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expiry()
    }
}

impl Serialize for ProcessRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ProcessRecord", 5)?;
        state.serialize_field("pid", &self.pid)?;
        state.serialize_field("start_time", &self.start_time)?;
        state.serialize_field("expiry", &self.expiry())?;
        state.serialize_field("tags", &self.tags)?;
        state.serialize_field("container_id", &self.container_id)?;
        state.end()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Computes `now_ms + ttl`, saturating instead of overflowing.
pub fn expiry_after(now_ms: i64, ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_add(ttl_ms)
}
