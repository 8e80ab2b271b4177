//! Process Table Module
//!
//! The primary store and the per-pid index, mutated together as one
//! consistency domain.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::cache::{
    expiry_after, PidIndex, ProcessEvent, ProcessKey, ProcessRecord, ProcessStore,
};
use crate::error::Result;

/// Result of committing one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Entries removed to make room for the record
    pub evicted: u64,
}

// == Process Table ==
/// Store + index pair.
///
/// A record is reachable from the index if and only if its key is in the
/// store. Every method leaves that invariant intact; callers hold the cache
/// lock around each call, so no caller observes a half-applied change.
#[derive(Debug)]
pub struct ProcessTable {
    store: ProcessStore,
    index: PidIndex,
    ttl: Duration,
}

impl ProcessTable {
    pub fn new(capacity: usize, max_per_pid_variants: usize, ttl: Duration) -> Result<Self> {
        Ok(Self {
            store: ProcessStore::new(capacity)?,
            index: PidIndex::new(max_per_pid_variants)?,
            ttl,
        })
    }

    // == Commit ==
    /// Inserts or refreshes a process, expiring `ttl` after `now_ms`.
    pub fn commit(&mut self, event: ProcessEvent, now_ms: i64) -> CommitOutcome {
        let record = Arc::new(ProcessRecord::from_event(event, expiry_after(now_ms, self.ttl)));
        trace!(pid = record.pid, start_time = record.start_time, "adding process to process cache");

        let Self { store, index, .. } = self;
        let mut outcome = CommitOutcome::default();

        // The hook only touches the index; the store is mid-call
        if store.put(record.clone(), |victim| {
            index.remove(&victim);
        }) {
            outcome.evicted += 1;
        }

        if let Some(displaced) = index.update(record) {
            trace!(
                pid = displaced.pid,
                start_time = displaced.start_time,
                "displacing oldest variant for pid"
            );
            // Already gone from the index
            if store.remove(&displaced.key(), |_| {}) {
                outcome.evicted += 1;
            }
        }

        outcome
    }

    // == Get ==
    /// Finds the instance of `pid` running at `timestamp`, sliding its expiry
    /// and marking it recently used.
    pub fn get(&mut self, pid: u32, timestamp: i64, now_ms: i64) -> Option<Arc<ProcessRecord>> {
        let Some(closest) = self.index.closest_at_or_before(pid, timestamp).cloned() else {
            trace!(pid, timestamp, "entry not found for process");
            return None;
        };

        closest.extend_expiry(now_ms, self.ttl);
        self.store.touch(&closest.key());
        trace!(pid, timestamp, start_time = closest.start_time, "found entry for pid");
        Some(closest)
    }

    // == Trim ==
    /// Removes every entry whose expiry is strictly before `now_ms`.
    ///
    /// Returns the number of entries removed.
    pub fn trim(&mut self, now_ms: i64) -> usize {
        let expired: Vec<ProcessKey> = self
            .store
            .values()
            .filter(|record| record.is_expired(now_ms))
            .map(|record| record.key())
            .collect();

        let Self { store, index, .. } = self;
        let mut trimmed = 0;
        for key in &expired {
            if store.remove(key, |record| {
                trace!(pid = record.pid, start_time = record.start_time, "trimming process");
                index.remove(&record);
            }) {
                trimmed += 1;
            }
        }
        trimmed
    }

    // == Dump ==
    /// Copies the index: pid -> variants in index order.
    pub fn dump(&self) -> BTreeMap<u32, Vec<Arc<ProcessRecord>>> {
        self.index
            .iter()
            .map(|(pid, list)| (*pid, list.clone()))
            .collect()
    }

    /// Keys currently held by the store, in no particular order.
    pub fn keys(&self) -> Vec<ProcessKey> {
        self.store.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn contains(&self, key: &ProcessKey) -> bool {
        self.store.contains(key)
    }

    // == Consistency Check ==
    /// Returns true if every index list is within bounds and the index holds
    /// exactly the records of the store.
    pub fn is_consistent(&self) -> bool {
        let max_len = self.index.max_len();
        if self.index.iter().any(|(_, list)| list.is_empty() || list.len() > max_len) {
            return false;
        }
        if self.index.record_count() != self.store.len() {
            return false;
        }
        self.index.iter().all(|(pid, list)| {
            list.iter().all(|record| {
                record.pid == *pid
                    && self
                        .store
                        .peek(&record.key())
                        .is_some_and(|stored| Arc::ptr_eq(stored, record))
            })
        })
    }
}
