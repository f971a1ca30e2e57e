//! Progress reporting for a running [`super::DownloaderPool`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

/// A point-in-time snapshot sent on the pool's progress channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Total names downloaded so far (success or failure).
    pub downloaded: u64,
    /// Names still in flight or queued.
    pub outstanding: u64,
}

/// Shared, lock-protected progress state.
///
/// Matches §4.3/§5: counters are atomic, the "last sent" timestamp is
/// guarded by a lock, and sends onto the progress channel are
/// non-blocking — a full channel simply drops the update.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    downloaded: AtomicU64,
    outstanding: AtomicU64,
    last_sent: Mutex<Option<Instant>>,
    interval: Duration,
    sender: Option<mpsc::Sender<ProgressUpdate>>,
}

impl ProgressTracker {
    pub(crate) fn new(sender: Option<mpsc::Sender<ProgressUpdate>>, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            downloaded: AtomicU64::new(0),
            outstanding: AtomicU64::new(0),
            last_sent: Mutex::new(None),
            interval,
            sender,
        })
    }

    pub(crate) fn set_outstanding(&self, outstanding: u64) {
        self.outstanding.store(outstanding, Ordering::SeqCst);
    }

    pub(crate) async fn record_download(&self) {
        self.downloaded.fetch_add(1, Ordering::SeqCst);
        self.maybe_send().await;
    }

    async fn maybe_send(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let now = Instant::now();
        let mut last = self.last_sent.lock().await;
        let due = match *last {
            Some(prev) => now.duration_since(prev) >= self.interval,
            None => true,
        };
        if !due {
            return;
        }
        *last = Some(now);
        drop(last);

        let update = ProgressUpdate {
            downloaded: self.downloaded.load(Ordering::SeqCst),
            outstanding: self.outstanding.load(Ordering::SeqCst),
        };
        // Non-blocking: a full channel just drops this update.
        let _ = sender.try_send(update);
    }

    pub(crate) fn total_downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }
}
