//! API Routes
//!
//! Configures the Axum router with the process cache debug endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    dump_handler, health_handler, lookup_handler, metrics_handler, stats_handler, submit_handler,
    trim_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /debug/process_cache` - Dump the per-pid index
/// - `GET /debug/process_cache/:pid/:timestamp` - Point-in-time lookup
/// - `POST /debug/process_cache/events` - Submit a process event
/// - `POST /debug/process_cache/trim` - Trim expired entries now
/// - `GET /debug/stats` - Cache counters
/// - `GET /metrics` - Prometheus scrape endpoint
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/debug/process_cache", get(dump_handler))
        .route("/debug/process_cache/events", post(submit_handler))
        .route("/debug/process_cache/trim", post(trim_handler))
        .route("/debug/process_cache/:pid/:timestamp", get(lookup_handler))
        .route("/debug/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
