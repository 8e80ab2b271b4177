//! Expiry Trim Task
//!
//! Background task that periodically removes expired process cache entries,
//! independently of capacity pressure.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{current_timestamp_ms, ProcessTable};

/// Removes every expired entry from the table right now.
///
/// Entries leave through the store's remove path, so the per-pid index is
/// updated in the same critical section. Returns the number removed.
pub fn trim_expired(table: &Mutex<ProcessTable>) -> usize {
    let removed = table.lock().trim(current_timestamp_ms());

    if removed > 0 {
        info!("Trimmed {} process cache entries", removed);
    } else {
        debug!("Process cache trim: no expired entries found");
    }
    removed
}

/// Spawns a background task that trims expired entries every `interval`.
///
/// The task exits once `cancel` is triggered.
///
/// # Example
/// ```ignore
/// let handle = spawn_trim_task(table.clone(), Duration::from_secs(300), token.child_token());
/// // Later, during shutdown:
/// token.cancel();
/// ```
pub fn spawn_trim_task(
    table: Arc<Mutex<ProcessTable>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting process cache trim task with interval of {:?}",
            interval
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    trim_expired(&table);
                }
            }
        }

        debug!("Process cache trim task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ProcessEvent, ProcessKey};

    fn event(pid: u32) -> ProcessEvent {
        ProcessEvent {
            pid,
            start_time: 1,
            tags: vec!["service:db".to_string()],
            container_id: None,
        }
    }

    fn table(ttl: Duration) -> Arc<Mutex<ProcessTable>> {
        Arc::new(Mutex::new(ProcessTable::new(100, 3, ttl).unwrap()))
    }

    #[test]
    fn test_trim_expired_uses_wall_clock() {
        let table = table(Duration::from_secs(60));
        let now = current_timestamp_ms();
        table.lock().commit(event(1), now - 120_000);
        table.lock().commit(event(2), now);

        assert_eq!(trim_expired(&table), 1);
        assert!(table.lock().contains(&ProcessKey::new(2, 1)));
    }

    #[tokio::test]
    async fn test_trim_task_removes_expired_entries() {
        let table = table(Duration::from_millis(100));
        table.lock().commit(event(1), current_timestamp_ms());

        let token = CancellationToken::new();
        let handle = spawn_trim_task(table.clone(), Duration::from_millis(200), token.clone());

        // Wait for the entry to expire and a sweep to run
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert!(table.lock().is_empty(), "Expired entry should have been trimmed");

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_trim_task_preserves_valid_entries() {
        let table = table(Duration::from_secs(3600));
        table.lock().commit(event(1), current_timestamp_ms());

        let token = CancellationToken::new();
        let handle = spawn_trim_task(table.clone(), Duration::from_millis(100), token.clone());

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(table.lock().len(), 1, "Valid entry should not be removed");

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_trim_task_stops_on_cancel() {
        let token = CancellationToken::new();
        let handle = spawn_trim_task(table(Duration::from_secs(1)), Duration::from_secs(60), token.clone());

        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("trim task should exit after cancellation")
            .unwrap();
    }
}
