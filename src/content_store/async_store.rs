//! Bounded-queue, N-worker wrapper around [`SyncContentStore`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::error::ContentStoreError;
use super::sync_store::{ContentStoreStats, SyncContentStore};

/// Configuration for an [`AsyncContentStore`].
#[derive(Debug, Clone, Copy)]
pub struct AsyncContentStoreConfig {
    pub workers: usize,
    pub queue_size: usize,
}

impl AsyncContentStoreConfig {
    #[must_use]
    pub fn new(workers: usize, queue_size: usize) -> Self {
        let workers = workers.max(1);
        Self { workers, queue_size: queue_size.max(1) }
    }
}

struct WriteJob {
    crawl_name: String,
    download_name: String,
    data: Vec<u8>,
}

/// Queues writes behind `N` workers backed by one [`SyncContentStore`].
///
/// `write` returns once the job is accepted onto the queue, not once it has
/// been durably written; call [`AsyncContentStore::finish`] to drain the
/// queue and collect any accumulated error.
pub struct AsyncContentStore {
    inner: Arc<SyncContentStore>,
    tx: Mutex<Option<mpsc::Sender<WriteJob>>>,
    handles: Mutex<Vec<JoinHandle<Result<(), ContentStoreError>>>>,
}

impl AsyncContentStore {
    #[must_use]
    pub fn new(inner: Arc<SyncContentStore>, config: AsyncContentStoreConfig, token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size);
        let shared_rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let rx = Arc::clone(&shared_rx);
            let inner = Arc::clone(&inner);
            let token = token.clone();
            handles.push(tokio::spawn(async move { write_worker(worker_id, rx, inner, token).await }));
        }

        Self {
            inner,
            tx: Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
        }
    }

    /// Enqueues a write job. Returns once accepted (or the run is
    /// cancelled) — not an indication the write itself succeeded.
    #[instrument(skip(self, data, token), fields(crawl_name, download_name))]
    pub async fn write(
        &self,
        crawl_name: impl Into<String>,
        download_name: impl Into<String>,
        data: Vec<u8>,
        token: &CancellationToken,
    ) -> Result<(), ContentStoreError> {
        let tx = {
            let guard = self.tx.lock().await;
            guard.clone().ok_or(ContentStoreError::Closed)?
        };
        let job = WriteJob {
            crawl_name: crawl_name.into(),
            download_name: download_name.into(),
            data,
        };
        tokio::select! {
            biased;
            () = token.cancelled() => Err(ContentStoreError::Cancelled),
            send_result = tx.send(job) => send_result.map_err(|_| ContentStoreError::Closed),
        }
    }

    /// Closes the write queue, waits for every worker to drain it, and
    /// returns any accumulated error.
    #[instrument(skip(self))]
    #[allow(clippy::expect_used)]
    pub async fn finish(&self) -> Result<(), ContentStoreError> {
        {
            let mut guard = self.tx.lock().await;
            *guard = None;
        }
        let mut handles = self.handles.lock().await;
        let mut errors = Vec::new();
        for handle in handles.drain(..) {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(join_err) => errors.push(ContentStoreError::Join(join_err.to_string())),
            }
        }
        info!(errors = errors.len(), "async content store finished");
        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.into_iter().next().expect("len checked above"))
        } else {
            Err(ContentStoreError::Multi(errors))
        }
    }

    /// Issues `items.len()` reads across `workers` concurrent readers,
    /// invoking `on_result` for each outcome as it arrives. Returning
    /// `false` from `on_result` stops issuing new reads; in-flight reads
    /// still complete.
    pub async fn read_v<F>(
        &self,
        items: Vec<(String, String)>,
        workers: usize,
        mut on_result: F,
        token: CancellationToken,
    ) -> Result<(), ContentStoreError>
    where
        F: FnMut(&str, &str, Result<Vec<u8>, ContentStoreError>) -> bool + Send,
    {
        let workers = workers.max(1);
        let stop = Arc::new(AtomicBool::new(false));
        let (req_tx, req_rx) = mpsc::channel::<(String, String)>(workers);
        let req_rx = Arc::new(Mutex::new(req_rx));
        let (res_tx, mut res_rx) = mpsc::channel(workers);

        let dist_stop = Arc::clone(&stop);
        let dist_token = token.clone();
        let distributor = tokio::spawn(async move {
            for item in items {
                if dist_stop.load(Ordering::SeqCst) || dist_token.is_cancelled() {
                    break;
                }
                if req_tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        let mut worker_handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let req_rx = Arc::clone(&req_rx);
            let res_tx = res_tx.clone();
            let inner = Arc::clone(&self.inner);
            let stop = Arc::clone(&stop);
            let token = token.clone();
            worker_handles.push(tokio::spawn(async move {
                loop {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let item = {
                        let mut guard = req_rx.lock().await;
                        guard.recv().await
                    };
                    let Some((crawl_name, download_name)) = item else {
                        break;
                    };
                    let result = inner.read(&crawl_name, &download_name, &token).await;
                    if res_tx.send((crawl_name, download_name, result)).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(res_tx);

        while let Some((crawl_name, download_name, result)) = res_rx.recv().await {
            if !on_result(&crawl_name, &download_name, result) {
                stop.store(true, Ordering::SeqCst);
            }
        }

        distributor.await.map_err(|e| ContentStoreError::Join(e.to_string()))?;
        for handle in worker_handles {
            handle.await.map_err(|e| ContentStoreError::Join(e.to_string()))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> ContentStoreStats {
        self.inner.stats()
    }
}

async fn write_worker(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<WriteJob>>>,
    inner: Arc<SyncContentStore>,
    token: CancellationToken,
) -> Result<(), ContentStoreError> {
    loop {
        let job = {
            let mut guard = rx.lock().await;
            tokio::select! {
                biased;
                () = token.cancelled() => return Err(ContentStoreError::Cancelled),
                item = guard.recv() => item,
            }
        };
        let Some(job) = job else {
            debug!(worker_id, "write queue closed, worker exiting");
            return Ok(());
        };
        inner.write(&job.crawl_name, &job.download_name, &job.data, &token).await?;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::fs::MemFs;

    fn store(token: CancellationToken) -> AsyncContentStore {
        let fs: Arc<dyn crate::fs::Fs> = Arc::new(MemFs::with_prefix_enforcement());
        let inner = Arc::new(SyncContentStore::new(fs, "content", 2, 0o644));
        AsyncContentStore::new(inner, AsyncContentStoreConfig::new(2, 4), token)
    }

    #[tokio::test]
    async fn writes_are_durable_after_finish() {
        let token = CancellationToken::new();
        let store = store(token.clone());
        store.write("crawl", "a.html", b"1".to_vec(), &token).await.unwrap();
        store.write("crawl", "b.html", b"2".to_vec(), &token).await.unwrap();
        store.finish().await.unwrap();
        assert_eq!(store.stats().writes, 2);
    }

    #[tokio::test]
    async fn write_after_finish_is_rejected() {
        let token = CancellationToken::new();
        let store = store(token.clone());
        store.finish().await.unwrap();
        let err = store.write("crawl", "a.html", b"1".to_vec(), &token).await.unwrap_err();
        assert!(matches!(err, ContentStoreError::Closed));
    }

    #[tokio::test]
    async fn read_v_invokes_callback_for_every_item() {
        let token = CancellationToken::new();
        let store = store(token.clone());
        store.write("crawl", "a.html", b"1".to_vec(), &token).await.unwrap();
        store.write("crawl", "b.html", b"2".to_vec(), &token).await.unwrap();
        store.finish().await.unwrap();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        store
            .read_v(
                vec![
                    ("crawl".to_string(), "a.html".to_string()),
                    ("crawl".to_string(), "b.html".to_string()),
                ],
                2,
                move |_crawl, name, result| {
                    seen_clone.lock().unwrap().push((name.to_string(), result.is_ok()));
                    true
                },
                token,
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(_, ok)| *ok));
    }

    #[tokio::test]
    async fn read_v_stops_issuing_new_reads_once_callback_returns_false() {
        let token = CancellationToken::new();
        let store = store(token.clone());
        for i in 0..10 {
            store
                .write("crawl", format!("{i}.html"), vec![i as u8], &token)
                .await
                .unwrap();
        }
        store.finish().await.unwrap();

        let items: Vec<_> = (0..10).map(|i| ("crawl".to_string(), format!("{i}.html"))).collect();
        let count = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let count_clone = Arc::clone(&count);
        store
            .read_v(
                items,
                1,
                move |_crawl, _name, _result| {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                    false
                },
                token,
            )
            .await
            .unwrap();
        // At least one result must have been delivered before stopping;
        // with a single worker, at most a couple more may already be
        // in flight when the stop flag is observed.
        assert!(count.load(Ordering::SeqCst) >= 1);
    }
}
