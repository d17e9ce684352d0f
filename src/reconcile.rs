//! The change-stream reconciler: turns external change notifications into
//! debounced cache refreshes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};

use crate::cache::FeedCache;
use crate::store::ChangeEvent;

/// Sustained churn must not postpone the refresh forever: after this many
/// debounce windows have elapsed since the first event of a burst, the
/// refresh runs even if events keep arriving.
const MAX_DEFERRAL_WINDOWS: u32 = 4;

/// Bridges a change-event receiver to [`FeedCache::refresh`].
///
/// Bursts of related events (a post plus its counters updating) collapse
/// into a single refetch: after the first event, further events are drained
/// until the debounce window passes quietly, then one refresh runs. A
/// deferral cap of a few windows bounds staleness when the stream emits
/// faster than the window indefinitely.
///
/// The task is torn down by [`shutdown`](Reconciler::shutdown) or by
/// dropping the reconciler; a leaked task would keep refreshing a cache
/// whose consumer no longer exists, which is a correctness bug, not just a
/// resource leak.
pub struct Reconciler {
    handle: JoinHandle<()>,
}

impl Reconciler {
    pub fn spawn(
        cache: Arc<FeedCache>,
        mut events: mpsc::Receiver<ChangeEvent>,
        debounce: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                tracing::debug!(table = %event.table, op = ?event.op, "change event");

                // Trailing-edge debounce with a staleness cap: wait for the
                // burst to settle, but never defer past the deadline. The
                // payload is never inspected; every event is only a trigger
                // to revalidate.
                let deadline = Instant::now() + debounce * MAX_DEFERRAL_WINDOWS;
                loop {
                    if Instant::now() >= deadline {
                        break;
                    }
                    match timeout(debounce, events.recv()).await {
                        Ok(Some(_)) => continue,
                        Ok(None) | Err(_) => break,
                    }
                }

                if let Err(e) = cache.refresh().await {
                    // Non-fatal: the feed stays usable on stale data and
                    // the next event or manual refresh tries again.
                    tracing::warn!(error = %e, "refresh after change event failed");
                }
            }
            tracing::debug!("change stream closed, reconciler exiting");
        });

        Self { handle }
    }

    /// Tears the subscription task down.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
