//! Response DTOs for the debug API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::{ProcessRecord, SubmitOutcome, TelemetrySnapshot};

/// Response body for a point-in-time lookup
/// (GET /debug/process_cache/:pid/:timestamp)
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse {
    /// The pid that was looked up
    pub pid: u32,
    /// The reference timestamp of the lookup
    pub timestamp: i64,
    /// The matching process instance
    pub process: Arc<ProcessRecord>,
}

impl LookupResponse {
    pub fn new(pid: u32, timestamp: i64, process: Arc<ProcessRecord>) -> Self {
        Self {
            pid,
            timestamp,
            process,
        }
    }
}

/// Response body for event submission (POST /debug/process_cache/events)
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    /// Whether the event was handed to the ingestion worker
    pub accepted: bool,
    /// What happened to the event
    pub outcome: SubmitOutcome,
}

impl SubmitResponse {
    pub fn new(outcome: SubmitOutcome) -> Self {
        Self {
            accepted: outcome.is_queued(),
            outcome,
        }
    }
}

/// Response body for a manual trim (POST /debug/process_cache/trim)
#[derive(Debug, Clone, Serialize)]
pub struct TrimResponse {
    /// Number of expired entries removed
    pub removed: usize,
}

/// Response body for the stats endpoint (GET /debug/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Whether correlation is enabled
    pub enabled: bool,
    /// Counter values and current size
    #[serde(flatten)]
    pub telemetry: TelemetrySnapshot,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a telemetry snapshot
    pub fn new(enabled: bool, telemetry: TelemetrySnapshot) -> Self {
        Self {
            enabled,
            hit_rate: telemetry.hit_rate(),
            telemetry,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
