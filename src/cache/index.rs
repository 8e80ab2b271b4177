//! Per-PID Index Module
//!
//! Resolves a pid to the few most recent process instances seen under it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::ProcessRecord;
use crate::error::{CacheError, Result};

// == Pid Index ==
/// Secondary index: pid -> bounded list of start-time variants.
///
/// Lists keep arrival order. When a list is full the oldest arrival is
/// displaced, independently of the store's LRU order. An empty list is never
/// kept: removing the last record drops the pid entirely.
#[derive(Debug)]
pub struct PidIndex {
    by_pid: HashMap<u32, Vec<Arc<ProcessRecord>>>,
    max_len: usize,
}

impl PidIndex {
    // == Constructor ==
    /// Creates an index holding at most `max_len` variants per pid.
    pub fn new(max_len: usize) -> Result<Self> {
        if max_len == 0 {
            return Err(CacheError::InvalidConfig(
                "max per-pid variants must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            by_pid: HashMap::new(),
            max_len,
        })
    }

    // == Update ==
    /// Indexes a record under its pid.
    ///
    /// A record with the same start time is replaced in place. Otherwise, if
    /// the list is full, the oldest entry is displaced and returned so the
    /// caller can drop it from the store as well.
    pub fn update(&mut self, record: Arc<ProcessRecord>) -> Option<Arc<ProcessRecord>> {
        let list = self
            .by_pid
            .entry(record.pid)
            .or_insert_with(|| Vec::with_capacity(self.max_len));

        if let Some(slot) = list.iter_mut().find(|p| p.start_time == record.start_time) {
            *slot = record;
            return None;
        }

        let displaced = if list.len() >= self.max_len {
            Some(list.remove(0))
        } else {
            None
        };

        list.push(record);
        displaced
    }

    // == Remove ==
    /// Removes a record by identity. Returns false if it was not indexed.
    pub fn remove(&mut self, record: &Arc<ProcessRecord>) -> bool {
        let Some(list) = self.by_pid.get_mut(&record.pid) else {
            return false;
        };

        let Some(pos) = list.iter().position(|p| Arc::ptr_eq(p, record)) else {
            return false;
        };

        list.remove(pos);
        if list.is_empty() {
            self.by_pid.remove(&record.pid);
        }
        true
    }

    // == Closest At Or Before ==
    /// Returns the variant of `pid` with the latest start time not after `timestamp`.
    ///
    /// A process that started after `timestamp` did not exist yet and is never
    /// returned, however close it is.
    pub fn closest_at_or_before(&self, pid: u32, timestamp: i64) -> Option<&Arc<ProcessRecord>> {
        self.by_pid
            .get(&pid)?
            .iter()
            .filter(|p| p.start_time <= timestamp)
            .max_by_key(|p| p.start_time)
    }

    #[cfg(test)]
    /// Returns the variants indexed under `pid`, in index order.
    pub fn variants(&self, pid: u32) -> Option<&[Arc<ProcessRecord>]> {
        self.by_pid.get(&pid).map(Vec::as_slice)
    }

    /// Iterates over every (pid, variants) pair.
    pub fn iter(&self) -> impl Iterator<Item = (&u32, &Vec<Arc<ProcessRecord>>)> {
        self.by_pid.iter()
    }

    #[cfg(test)]
    /// Number of distinct pids indexed.
    pub fn pid_count(&self) -> usize {
        self.by_pid.len()
    }

    /// Number of records indexed across all pids.
    pub fn record_count(&self) -> usize {
        self.by_pid.values().map(Vec::len).sum()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}
