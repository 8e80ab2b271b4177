//! Background Tasks Module
//!
//! Contains the background tasks owned by a running process cache.
//!
//! # Tasks
//! - Ingestion worker: commits queued process events into the table
//! - Expiry trim: removes expired entries at the configured interval

mod ingest;
mod trim;

pub use ingest::spawn_ingest_worker;
pub use trim::{spawn_trim_task, trim_expired};
