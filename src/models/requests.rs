//! Request DTOs for the debug API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::ProcessEvent;

/// Request body for event submission (POST /debug/process_cache/events)
///
/// The body is a process event: `pid`, `start_time`, optional `tags` and
/// optional `container_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    #[serde(flatten)]
    pub event: ProcessEvent,
}

impl SubmitRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.event.pid == 0 {
            return Some("pid 0 is not a user process".to_string());
        }
        if self.event.tags.iter().any(|t| t.is_empty()) {
            return Some("tags cannot be empty strings".to_string());
        }
        None
    }

    pub fn into_event(self) -> ProcessEvent {
        self.event
    }
}

impl From<ProcessEvent> for SubmitRequest {
    fn from(event: ProcessEvent) -> Self {
        Self { event }
    }
}
