//! API Module
//!
//! Debug HTTP handlers and routing for the process cache.
//!
//! # Endpoints
//! - `GET /debug/process_cache` - Dump the per-pid index
//! - `GET /debug/process_cache/:pid/:timestamp` - Point-in-time lookup
//! - `POST /debug/process_cache/events` - Submit a process event
//! - `POST /debug/process_cache/trim` - Trim expired entries now
//! - `GET /debug/stats` - Cache counters
//! - `GET /metrics` - Prometheus scrape endpoint
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
