//! API Handlers
//!
//! HTTP request handlers for the process cache debug endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, Registry, TextEncoder};

use crate::cache::{build, ProcessCorrelator, ProcessDump};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    HealthResponse, LookupResponse, StatsResponse, SubmitRequest, SubmitResponse, TrimResponse,
};

/// Application state shared across all handlers.
///
/// Holds the correlator behind its capability trait, so handlers behave the
/// same whether correlation is enabled or not.
#[derive(Clone)]
pub struct AppState {
    /// Process cache (enabled or disabled)
    pub cache: Arc<dyn ProcessCorrelator>,
    /// Registry scraped by GET /metrics
    pub registry: Registry,
}

impl AppState {
    /// Creates a new AppState around an existing correlator.
    pub fn new(cache: Arc<dyn ProcessCorrelator>, registry: Registry) -> Self {
        Self { cache, registry }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the correlator selected by the config and registers its
    /// telemetry in a fresh registry.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = Registry::new();
        let cache = build(config, &registry)?;
        Ok(Self::new(cache, registry))
    }
}

/// Handler for POST /debug/process_cache/events
///
/// Offers a process event for ingestion. Overload and uncorrelatable events
/// are not errors: the response reports the outcome.
pub async fn submit_handler(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let outcome = state.cache.submit(req.into_event());
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse::new(outcome))))
}

/// Handler for GET /debug/process_cache/:pid/:timestamp
///
/// Finds the process instance of `pid` that was running at `timestamp`.
pub async fn lookup_handler(
    State(state): State<AppState>,
    Path((pid, timestamp)): Path<(u32, i64)>,
) -> Result<Json<LookupResponse>> {
    match state.cache.get(pid, timestamp) {
        Some(process) => Ok(Json(LookupResponse::new(pid, timestamp, process))),
        None => Err(CacheError::NotFound(format!(
            "no process for pid {} at {}",
            pid, timestamp
        ))),
    }
}

/// Handler for GET /debug/process_cache
///
/// Returns the per-pid index, each pid mapped to its variants in index order.
pub async fn dump_handler(State(state): State<AppState>) -> Json<ProcessDump> {
    Json(state.cache.dump())
}

/// Handler for POST /debug/process_cache/trim
///
/// Runs an expiry sweep immediately.
pub async fn trim_handler(State(state): State<AppState>) -> Json<TrimResponse> {
    Json(TrimResponse {
        removed: state.cache.trim(),
    })
}

/// Handler for GET /debug/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.cache.is_enabled(),
        state.cache.telemetry(),
    ))
}

/// Handler for GET /metrics
///
/// Prometheus text exposition of every collector in the registry.
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&state.registry.gather(), &mut buffer)?;

    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
