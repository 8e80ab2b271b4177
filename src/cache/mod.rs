//! Cache Module
//!
//! Bounded process correlation cache: a capacity-limited LRU store keyed by
//! (pid, start time), a per-pid index for point-in-time lookups, and the
//! public correlator handles built on top of them.

mod correlator;
mod index;
mod lru;
mod record;
mod store;
mod table;
mod telemetry;


// Re-export public types
pub use correlator::{
    build, DisabledCache, ProcessCache, ProcessCorrelator, ProcessDump, SubmitOutcome,
};
pub use index::PidIndex;
pub use lru::LruTracker;
pub use record::{current_timestamp_ms, expiry_after, ProcessEvent, ProcessKey, ProcessRecord};
pub use store::ProcessStore;
pub use table::{CommitOutcome, ProcessTable};
pub use telemetry::{CacheTelemetry, MetricsRegistration, TelemetrySnapshot};
