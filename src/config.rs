//! Configuration Module
//!
//! Handles loading and validating process cache configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Process cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether correlation is enabled; a disabled cache answers every call as a no-op
    pub enabled: bool,
    /// Maximum number of distinct (pid, start time) entries
    pub capacity: usize,
    /// Maximum number of events waiting for the ingestion worker
    pub queue_length: usize,
    /// Maximum number of start-time variants indexed per pid
    pub max_per_pid_variants: usize,
    /// Sliding expiry applied on commit and on every successful lookup
    pub entry_ttl: Duration,
    /// Period of the expiry sweep
    pub trim_interval: Duration,
    /// Debug HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PROCESS_CACHE_ENABLED` - Enable correlation (default: true)
    /// - `PROCESS_CACHE_CAPACITY` - Maximum cache entries (default: 1024)
    /// - `PROCESS_CACHE_QUEUE_LENGTH` - Ingestion backlog (default: 100)
    /// - `PROCESS_CACHE_MAX_PER_PID` - Start-time variants per pid (default: 3)
    /// - `PROCESS_CACHE_ENTRY_TTL_SECS` - Sliding expiry in seconds (default: 120)
    /// - `PROCESS_CACHE_TRIM_INTERVAL_SECS` - Sweep period in seconds (default: 300)
    /// - `SERVER_PORT` - Debug HTTP server port (default: 5555)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_or("PROCESS_CACHE_ENABLED", defaults.enabled),
            capacity: env_or("PROCESS_CACHE_CAPACITY", defaults.capacity),
            queue_length: env_or("PROCESS_CACHE_QUEUE_LENGTH", defaults.queue_length),
            max_per_pid_variants: env_or("PROCESS_CACHE_MAX_PER_PID", defaults.max_per_pid_variants),
            entry_ttl: Duration::from_secs(env_or(
                "PROCESS_CACHE_ENTRY_TTL_SECS",
                defaults.entry_ttl.as_secs(),
            )),
            trim_interval: Duration::from_secs(env_or(
                "PROCESS_CACHE_TRIM_INTERVAL_SECS",
                defaults.trim_interval.as_secs(),
            )),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    /// Checks that every sizing and timing parameter is usable.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if self.queue_length == 0 {
            return Err(CacheError::InvalidConfig(
                "queue length must be greater than zero".to_string(),
            ));
        }
        if self.max_per_pid_variants == 0 {
            return Err(CacheError::InvalidConfig(
                "max per-pid variants must be greater than zero".to_string(),
            ));
        }
        if self.entry_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "entry TTL must be greater than zero".to_string(),
            ));
        }
        if self.trim_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "trim interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1024,
            queue_length: 100,
            max_per_pid_variants: 3,
            entry_ttl: Duration::from_secs(120),
            trim_interval: Duration::from_secs(300),
            server_port: 5555,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
