//! Synchronous sharded content store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::error::ContentStoreError;
use super::shard::shard_path;
use crate::fs::Fs;

/// Read/write counters exposed by a content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentStoreStats {
    pub reads: u64,
    pub writes: u64,
}

/// Writes artifacts synchronously via `Fs::put`, retrying once with
/// `ensure_prefix` when the parent prefix is missing.
pub struct SyncContentStore {
    fs: Arc<dyn Fs>,
    root: String,
    shard_chars: usize,
    mode: u32,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl SyncContentStore {
    #[must_use]
    pub fn new(fs: Arc<dyn Fs>, root: impl Into<String>, shard_chars: usize, mode: u32) -> Self {
        Self {
            fs,
            root: root.into(),
            shard_chars,
            mode,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    fn path_for(&self, crawl_name: &str, download_name: &str) -> (String, String) {
        let (dir, file) = shard_path(crawl_name, download_name, self.shard_chars);
        let full_dir = self.fs.join(&[&self.root, &dir]);
        let path = self.fs.join(&[&full_dir, &file]);
        (full_dir, path)
    }

    /// Writes `data` under the shard derived from `crawl_name` and
    /// `download_name`. On a missing-prefix failure, creates the
    /// intermediate directory and retries exactly once.
    #[instrument(skip(self, data, token), fields(crawl_name, download_name))]
    pub async fn write(
        &self,
        crawl_name: &str,
        download_name: &str,
        data: &[u8],
        token: &CancellationToken,
    ) -> Result<(), ContentStoreError> {
        let (dir, path) = self.path_for(crawl_name, download_name);
        match self.fs.put(&path, self.mode, data, token).await {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) if e.is_not_exist() => {
                self.fs.ensure_prefix(&dir, self.mode, token).await?;
                self.fs.put(&path, self.mode, data, token).await?;
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the artifact stored under the shard derived from `crawl_name`
    /// and `download_name`.
    pub async fn read(
        &self,
        crawl_name: &str,
        download_name: &str,
        token: &CancellationToken,
    ) -> Result<Vec<u8>, ContentStoreError> {
        let (_, path) = self.path_for(crawl_name, download_name);
        let data = self.fs.get(&path, token).await?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(data)
    }

    #[must_use]
    pub fn stats(&self) -> ContentStoreStats {
        ContentStoreStats {
            reads: self.reads.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::with_prefix_enforcement());
        let store = SyncContentStore::new(fs, "content", 2, 0o644);
        let token = CancellationToken::new();
        store.write("crawl-a", "page.html", b"hello", &token).await.unwrap();
        assert_eq!(store.read("crawl-a", "page.html", &token).await.unwrap(), b"hello");
        assert_eq!(store.stats(), ContentStoreStats { reads: 1, writes: 1 });
    }

    #[tokio::test]
    async fn write_retries_once_after_creating_missing_prefix() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::with_prefix_enforcement());
        let store = SyncContentStore::new(fs, "content", 2, 0o644);
        let token = CancellationToken::new();
        // No ensure_prefix call made up front; write must self-heal.
        store.write("crawl-a", "missing.html", b"data", &token).await.unwrap();
        assert_eq!(store.read("crawl-a", "missing.html", &token).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn distinct_downloads_land_under_their_own_shard() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::with_prefix_enforcement());
        let store = SyncContentStore::new(fs, "content", 2, 0o644);
        let token = CancellationToken::new();
        store.write("crawl-a", "one.html", b"1", &token).await.unwrap();
        store.write("crawl-a", "two.html", b"2", &token).await.unwrap();
        assert_eq!(store.read("crawl-a", "one.html", &token).await.unwrap(), b"1");
        assert_eq!(store.read("crawl-a", "two.html", &token).await.unwrap(), b"2");
    }
}
