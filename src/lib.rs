//! Procache - process correlation cache
//!
//! Joins short-lived network flow events with the metadata of the process
//! that produced them, even after that process has exited. Pids are reused,
//! so lookups pick the instance whose start time fits the event time.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{build, DisabledCache, ProcessCache, ProcessCorrelator, ProcessEvent, ProcessRecord};
pub use config::Config;
pub use error::{CacheError, Result};
