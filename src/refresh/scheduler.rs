//! Background refresh loop
//!
//! Keeps the table warm independent of query traffic by asking the
//! coordinator for a refresh on a fixed interval. Outcomes are logged and
//! published on a channel; a failed attempt never stops the loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{RefreshCoordinator, RefreshOutcome};
use crate::data::Fingerprint;

/// Capacity of the event channel; events beyond it are dropped
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Messages sent from the background refresh to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    /// New content was installed
    Updated {
        fingerprint: Fingerprint,
        entries: usize,
    },
    /// Remote content matched the active table
    Unchanged,
    /// The attempt failed; the previous table stays active
    Failed(String),
}

impl From<&RefreshOutcome> for RefreshEvent {
    fn from(outcome: &RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Updated { index, fingerprint } => RefreshEvent::Updated {
                fingerprint: fingerprint.clone(),
                entries: index.len(),
            },
            RefreshOutcome::Unchanged => RefreshEvent::Unchanged,
            RefreshOutcome::Failed(e) => RefreshEvent::Failed(e.to_string()),
        }
    }
}

/// Periodic refresh driver
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    coordinator: Arc<RefreshCoordinator>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(coordinator: Arc<RefreshCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    /// Spawns the loop; the first refresh runs immediately
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Returns
    /// A RefreshHandle that receives refresh events via the `receiver` channel
    pub fn spawn(self) -> RefreshHandle {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let outcome = self.coordinator.refresh_once().await;
                        match &outcome {
                            RefreshOutcome::Failed(_) => {
                                tracing::info!(outcome = %outcome, "scheduled refresh failed, will retry next tick");
                            }
                            _ => tracing::debug!(outcome = %outcome, "scheduled refresh"),
                        }
                        // Nobody reading is fine; a slow reader must not stall the loop.
                        let _ = event_tx.try_send(RefreshEvent::from(&outcome));
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("refresh scheduler stopping");
                        break;
                    }
                }
            }
        });

        RefreshHandle {
            receiver: event_rx,
            shutdown_tx,
            task,
        }
    }
}

/// Handle for controlling the background refresh loop
///
/// Dropping the handle also stops the loop, after any refresh in progress.
#[derive(Debug)]
pub struct RefreshHandle {
    /// Channel for receiving refresh events
    pub receiver: mpsc::Receiver<RefreshEvent>,
    /// Signals shutdown; closing it has the same effect
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stops the loop and waits for it to exit
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = (&mut self.task).await;
    }

    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Checks for a pending refresh event without blocking
///
/// # Arguments
/// * `handle` - The RefreshHandle to check
///
/// # Returns
/// * `Some(RefreshEvent)` if an event was available
/// * `None` if no events are pending
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshEvent> {
    handle.receiver.try_recv().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DurableStore;
    use crate::lookup::ActiveTable;
    use crate::remote::{FetchError, RemoteSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Feed that fails on every odd call
    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteSource for FlakySource {
        async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 1 {
                return Err(FetchError::Network("connection reset".to_string()));
            }
            Ok(br#"[{"country_code":"US","branch":"NY1","legal_entity":"LE-US"}]"#.to_vec())
        }
    }

    fn scheduler(dir: &TempDir, interval: Duration) -> (RefreshScheduler, Arc<FlakySource>) {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        });
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&source) as Arc<dyn RemoteSource>,
            DurableStore::new(dir.path(), "test"),
            Arc::new(ActiveTable::default()),
            Duration::from_secs(5),
        );
        (RefreshScheduler::new(coordinator, interval), source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_emits_events_and_survives_failures() {
        let dir = TempDir::new().unwrap();
        let (scheduler, source) = scheduler(&dir, Duration::from_secs(900));
        let mut handle = scheduler.spawn();

        let first = handle.receiver.recv().await.unwrap();
        assert!(matches!(first, RefreshEvent::Updated { entries: 1, .. }));

        let second = handle.receiver.recv().await.unwrap();
        assert_eq!(
            second,
            RefreshEvent::Failed("Network error: connection reset".to_string())
        );

        let third = handle.receiver.recv().await.unwrap();
        assert_eq!(third, RefreshEvent::Unchanged);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_waits_interval_between_ticks() {
        let dir = TempDir::new().unwrap();
        let (scheduler, source) = scheduler(&dir, Duration::from_secs(900));
        let mut handle = scheduler.spawn();

        handle.receiver.recv().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(899)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(try_recv(&mut handle).is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let dir = TempDir::new().unwrap();
        let (scheduler, _source) = scheduler(&dir, Duration::from_secs(900));
        let mut handle = scheduler.spawn();
        handle.receiver.recv().await.unwrap();

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_loop() {
        let dir = TempDir::new().unwrap();
        let (scheduler, source) = scheduler(&dir, Duration::from_millis(10));
        let handle = scheduler.spawn();
        drop(handle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let calls = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn test_event_from_failed_outcome() {
        let outcome = RefreshOutcome::Failed(FetchError::HttpStatus(502).into());
        assert_eq!(
            RefreshEvent::from(&outcome),
            RefreshEvent::Failed("HTTP status 502".to_string())
        );
    }
}
