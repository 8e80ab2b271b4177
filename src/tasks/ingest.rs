//! Ingestion Worker
//!
//! The single consumer of the ingestion queue. All writes into the process
//! table go through this task, one event at a time.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheTelemetry, ProcessEvent, ProcessTable};

/// Spawns the ingestion worker draining `queue` into `table`.
///
/// The worker exits when `cancel` fires or every sender is gone. A commit in
/// progress always completes; events still queued at that point are dropped.
pub fn spawn_ingest_worker(
    mut queue: mpsc::Receiver<ProcessEvent>,
    table: Arc<Mutex<ProcessTable>>,
    telemetry: CacheTelemetry,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = queue.recv() => match received {
                    Some(event) => {
                        let outcome = table.lock().commit(event, current_timestamp_ms());
                        if outcome.evicted > 0 {
                            telemetry.record_evictions(outcome.evicted);
                        }
                    }
                    None => break,
                },
            }
        }

        debug!("Process cache ingestion worker stopped");
    })
}
