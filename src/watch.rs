//! Background polling of the snapshot cache

use futures::Stream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{Snapshot, SnapshotCache};

/// Longest wait between attempts after repeated failures
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Result of spawning a watcher
#[derive(Debug, Clone)]
pub struct WatcherChannels {
    /// Latest snapshot; `None` once the watcher has stopped
    pub snapshots: watch::Receiver<Option<Arc<Snapshot>>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

impl WatcherChannels {
    /// Stream of snapshots, starting with the current one.
    pub fn snapshot_updates(&self) -> impl Stream<Item = Arc<Snapshot>> + 'static {
        WatchStream::new(self.snapshots.clone()).filter_map(|opt| async move { opt })
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshots.borrow().clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Polls [`SnapshotCache::refresh`] and publishes every rebuilt snapshot
///
/// Refreshes run on the blocking pool since they read and parse files. Failures
/// are logged and retried with exponential backoff; the last good snapshot stays
/// published meanwhile.
pub struct CacheWatcher;

impl CacheWatcher {
    pub fn spawn(cache: Arc<SnapshotCache>, interval: Duration) -> WatcherChannels {
        let (snapshot_tx, snapshot_rx) = watch::channel(Some(cache.current()));
        let cancel = CancellationToken::new();

        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            Self::poll_task(cache, interval, snapshot_tx, cancel_task).await;
        });

        WatcherChannels { snapshots: snapshot_rx, cancel }
    }

    fn backoff(interval: Duration, error_count: u32) -> Duration {
        interval.saturating_mul(1 << error_count.min(5)).min(MAX_BACKOFF)
    }

    async fn poll_task(
        cache: Arc<SnapshotCache>,
        interval: Duration,
        snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
        cancel: CancellationToken,
    ) {
        info!(interval_ms = interval.as_millis() as u64, "Cache watcher started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial snapshot is already published
        ticker.tick().await;

        let mut error_count = 0u32;
        let mut reloads = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Cache watcher cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let task_cache = Arc::clone(&cache);
            let outcome = tokio::task::spawn_blocking(move || task_cache.refresh()).await;

            let failure = match outcome {
                Ok(Ok(Some(snapshot))) => {
                    error_count = 0;
                    reloads += 1;
                    debug!(generation = snapshot.generation, "Publishing snapshot");
                    if snapshot_tx.send(Some(snapshot)).is_err() {
                        debug!("Snapshot receivers dropped, shutting down");
                        break;
                    }
                    continue;
                }
                Ok(Ok(None)) => {
                    error_count = 0;
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => {
                    error!(error = %e, "Refresh task failed");
                    e.to_string()
                }
            };

            error_count += 1;
            let backoff = Self::backoff(interval, error_count);
            warn!(
                errors = error_count,
                backoff_ms = backoff.as_millis() as u64,
                error = %failure,
                "Refresh failed, keeping current snapshot"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Cache watcher cancelled during backoff");
                    break;
                }
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        let _ = snapshot_tx.send(None);
        info!(reloads, "Cache watcher ended");
    }
}
