//! Process Store Module
//!
//! Capacity-bounded primary store keyed by (pid, start time), evicting the
//! least recently used entry when full.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::cache::{LruTracker, ProcessKey, ProcessRecord};
use crate::error::{CacheError, Result};

// == Process Store ==
/// Authoritative bounded collection of committed process records.
///
/// The store never touches the per-pid index itself. Every removal it
/// performs (capacity eviction or explicit remove) hands the removed record to
/// a caller-supplied hook, which runs synchronously before the method returns.
#[derive(Debug)]
pub struct ProcessStore {
    /// Key-record storage
    entries: HashMap<ProcessKey, Arc<ProcessRecord>>,
    /// LRU access tracker
    lru: LruTracker<ProcessKey>,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl ProcessStore {
    // == Constructor ==
    /// Creates a new store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            entries: HashMap::with_capacity(capacity),
            lru: LruTracker::new(),
            capacity,
        })
    }

    // == Put ==
    /// Inserts or replaces the record under its key and marks it most recently used.
    ///
    /// If the key is new and the store is full, the least recently used entry is
    /// evicted first and passed to `on_evict`. Returns true when an eviction happened.
    pub fn put<F>(&mut self, record: Arc<ProcessRecord>, mut on_evict: F) -> bool
    where
        F: FnMut(Arc<ProcessRecord>),
    {
        let key = record.key();
        let is_overwrite = self.entries.contains_key(&key);

        let mut evicted = false;
        if !is_overwrite && self.entries.len() >= self.capacity {
            if let Some(victim_key) = self.lru.evict_oldest() {
                if let Some(victim) = self.entries.remove(&victim_key) {
                    trace!(pid = victim.pid, start_time = victim.start_time, "evicting process");
                    on_evict(victim);
                    evicted = true;
                }
            }
        }

        self.entries.insert(key, record);
        self.lru.touch(&key);
        evicted
    }

    // == Remove ==
    /// Removes an entry by key, handing it to `on_remove`.
    ///
    /// Returns false if the key was not present; the hook is not called then.
    pub fn remove<F>(&mut self, key: &ProcessKey, on_remove: F) -> bool
    where
        F: FnOnce(Arc<ProcessRecord>),
    {
        match self.entries.remove(key) {
            Some(record) => {
                self.lru.remove(key);
                on_remove(record);
                true
            }
            None => false,
        }
    }

    // == Touch ==
    /// Marks a key as recently used without changing its record.
    pub fn touch(&mut self, key: &ProcessKey) -> bool {
        if self.entries.contains_key(key) {
            self.lru.touch(key);
            true
        } else {
            false
        }
    }

    /// Returns the record for a key without affecting recency.
    pub fn peek(&self, key: &ProcessKey) -> Option<&Arc<ProcessRecord>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ProcessKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates over all stored records, in no particular order.
    pub fn values(&self) -> impl Iterator<Item = &Arc<ProcessRecord>> {
        self.entries.values()
    }

    /// Iterates over all stored keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &ProcessKey> {
        self.entries.keys()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ProcessEvent;

    fn record(pid: u32, start_time: i64) -> Arc<ProcessRecord> {
        let event = ProcessEvent {
            pid,
            start_time,
            tags: vec!["env:test".to_string()],
            container_id: None,
        };
        Arc::new(ProcessRecord::from_event(event, i64::MAX))
    }

    #[test]
    fn test_store_new() {
        let store = ProcessStore::new(100).unwrap();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 100);
    }

    #[test]
    fn test_store_zero_capacity_rejected() {
        assert!(matches!(
            ProcessStore::new(0),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_store_put_and_peek() {
        let mut store = ProcessStore::new(10).unwrap();

        let evicted = store.put(record(1, 100), |_| panic!("no eviction expected"));
        assert!(!evicted);

        let stored = store.peek(&ProcessKey::new(1, 100)).unwrap();
        assert_eq!(stored.pid, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_overwrite_keeps_single_entry() {
        let mut store = ProcessStore::new(1).unwrap();

        store.put(record(1, 100), |_| {});
        let replacement = record(1, 100);
        let evicted = store.put(replacement.clone(), |_| panic!("overwrite must not evict"));

        assert!(!evicted);
        assert_eq!(store.len(), 1);
        assert!(Arc::ptr_eq(
            store.peek(&ProcessKey::new(1, 100)).unwrap(),
            &replacement
        ));
    }

    #[test]
    fn test_store_lru_eviction_calls_hook() {
        let mut store = ProcessStore::new(2).unwrap();
        let mut evicted = Vec::new();

        store.put(record(1, 10), |r| evicted.push(r.key()));
        store.put(record(2, 20), |r| evicted.push(r.key()));
        let did_evict = store.put(record(3, 30), |r| evicted.push(r.key()));

        assert!(did_evict);
        assert_eq!(evicted, vec![ProcessKey::new(1, 10)]);
        assert_eq!(store.len(), 2);
        assert!(!store.contains(&ProcessKey::new(1, 10)));
    }

    #[test]
    fn test_store_touch_protects_from_eviction() {
        let mut store = ProcessStore::new(2).unwrap();
        let mut evicted = Vec::new();

        store.put(record(1, 10), |_| {});
        store.put(record(2, 20), |_| {});
        assert!(store.touch(&ProcessKey::new(1, 10)));
        store.put(record(3, 30), |r| evicted.push(r.key()));

        assert_eq!(evicted, vec![ProcessKey::new(2, 20)]);
        assert!(store.contains(&ProcessKey::new(1, 10)));
    }

    #[test]
    fn test_store_touch_missing_key() {
        let mut store = ProcessStore::new(2).unwrap();
        assert!(!store.touch(&ProcessKey::new(9, 9)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_remove_calls_hook() {
        let mut store = ProcessStore::new(5).unwrap();
        store.put(record(4, 40), |_| {});

        let mut removed = None;
        assert!(store.remove(&ProcessKey::new(4, 40), |r| removed = Some(r.key())));
        assert_eq!(removed, Some(ProcessKey::new(4, 40)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_remove_nonexistent() {
        let mut store = ProcessStore::new(5).unwrap();
        assert!(!store.remove(&ProcessKey::new(4, 40), |_| panic!("hook must not run")));
    }
}
