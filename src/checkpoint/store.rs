//! `CheckpointStore`: monotonically numbered snapshots on an `Fs` prefix.
//!
//! Grounded in the teacher's `queue`/`db` layer's principle of one
//! serializing lock per logical store (there, a `tokio::sync::Mutex`
//! wrapping a `sqlx::Pool` handle; here, the same idea guarding a bare `Fs`
//! prefix instead of a database connection) plus `remote_storage`'s
//! `LocalFs` listing conventions for the directory scan itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::fs::{Fs, FsError};

const SEQUENCE_DIGITS: usize = 8;
const SCAN_BATCH_SIZE: usize = 256;

/// Errors a [`CheckpointStore`] can surface.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint store prefix must not be empty")]
    EmptyPrefix,

    #[error("checkpoint store already initialized")]
    AlreadyInitialized,

    #[error("no checkpoint exists to compact")]
    NothingToCompact,

    #[error(transparent)]
    Fs(#[from] FsError),
}

/// A store for an ordered sequence of opaque byte payloads under one `Fs`
/// prefix, named `NNNNNNNN<label>.chk`.
///
/// All mutating operations serialize on an internal lock; every
/// `Checkpoint` call rescans the prefix, so this is not designed for high
/// write rates.
pub struct CheckpointStore {
    fs: Arc<dyn Fs>,
    prefix: String,
    mode: u32,
    lock: Mutex<()>,
    initialized: AtomicBool,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(fs: Arc<dyn Fs>, prefix: impl Into<String>, mode: u32) -> Self {
        Self {
            fs,
            prefix: prefix.into(),
            mode,
            lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Ensures the store's prefix exists. Fails if the prefix is empty or
    /// this store has already been initialized.
    #[instrument(skip(self, token))]
    pub async fn init(&self, token: &CancellationToken) -> Result<(), CheckpointError> {
        if self.prefix.is_empty() {
            return Err(CheckpointError::EmptyPrefix);
        }
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(CheckpointError::AlreadyInitialized);
        }
        self.fs.ensure_prefix(&self.prefix, self.mode, token).await?;
        Ok(())
    }

    /// Writes a new checkpoint, returning its id (the filename it was
    /// written under).
    #[instrument(skip(self, data, token), fields(label))]
    pub async fn checkpoint(
        &self,
        label: &str,
        data: &[u8],
        token: &CancellationToken,
    ) -> Result<String, CheckpointError> {
        let _guard = self.lock.lock().await;
        let existing = self.scan(token).await?;
        let next_seq = existing.iter().map(|(seq, _)| *seq).max().map_or(0, |n| n + 1);
        let name = format_checkpoint_name(next_seq, label);
        let path = self.fs.join(&[&self.prefix, &name]);
        self.fs.put(&path, self.mode, data, token).await?;
        debug!(name, "wrote checkpoint");
        Ok(name)
    }

    /// Returns the payload of the highest-numbered checkpoint, or `None` if
    /// the store has no checkpoints.
    pub async fn latest(&self, token: &CancellationToken) -> Result<Option<Vec<u8>>, CheckpointError> {
        let existing = self.scan(token).await?;
        let Some((_, name)) = existing.into_iter().max_by_key(|(seq, _)| *seq) else {
            return Ok(None);
        };
        let path = self.fs.join(&[&self.prefix, &name]);
        Ok(Some(self.fs.get(&path, token).await?))
    }

    /// Fetches a checkpoint directly by the id returned from
    /// [`CheckpointStore::checkpoint`].
    pub async fn load(&self, id: &str, token: &CancellationToken) -> Result<Vec<u8>, CheckpointError> {
        let path = self.fs.join(&[&self.prefix, id]);
        Ok(self.fs.get(&path, token).await?)
    }

    /// Collapses the store to a single file: the current highest-numbered
    /// checkpoint's payload, rewritten as `00000000<label>.chk`.
    #[instrument(skip(self, token), fields(label))]
    pub async fn compact(&self, label: &str, token: &CancellationToken) -> Result<String, CheckpointError> {
        let _guard = self.lock.lock().await;
        let existing = self.scan(token).await?;
        let Some((_, name)) = existing.into_iter().max_by_key(|(seq, _)| *seq) else {
            return Err(CheckpointError::NothingToCompact);
        };
        let path = self.fs.join(&[&self.prefix, &name]);
        let data = self.fs.get(&path, token).await?;

        self.fs.delete_all(&self.prefix, token).await?;
        self.fs.ensure_prefix(&self.prefix, self.mode, token).await?;

        let compacted_name = format_checkpoint_name(0, label);
        let compacted_path = self.fs.join(&[&self.prefix, &compacted_name]);
        self.fs.put(&compacted_path, self.mode, &data, token).await?;
        Ok(compacted_name)
    }

    /// Removes every file under the store's prefix.
    pub async fn clear(&self, token: &CancellationToken) -> Result<(), CheckpointError> {
        let _guard = self.lock.lock().await;
        self.fs.delete_all(&self.prefix, token).await?;
        Ok(())
    }

    /// Deletes every checkpoint file, signaling the crawl this store backs
    /// finished successfully. Identical to `clear` at the `Fs` level; kept
    /// distinct so callers express intent (abort vs. success) at call sites.
    pub async fn complete(&self, token: &CancellationToken) -> Result<(), CheckpointError> {
        self.clear(token).await
    }

    /// Lists every `^\d{8}.*\.chk$` entry under the prefix as `(sequence,
    /// filename)` pairs. Non-matching entries are silently ignored.
    async fn scan(&self, token: &CancellationToken) -> Result<Vec<(u32, String)>, CheckpointError> {
        let mut scanner = self.fs.level_scanner(&self.prefix, SCAN_BATCH_SIZE);
        let mut found = Vec::new();
        loop {
            let batch = scanner.next_batch().await.or_else(|e| {
                if e.is_not_exist() {
                    Ok(Vec::new())
                } else {
                    Err(CheckpointError::from(e))
                }
            })?;
            if batch.is_empty() {
                break;
            }
            for entry in batch {
                if entry.is_dir {
                    continue;
                }
                if let Some(seq) = parse_sequence(&entry.name) {
                    found.push((seq, entry.name));
                }
            }
            if token.is_cancelled() {
                return Err(CheckpointError::Fs(FsError::Cancelled { path: self.prefix.clone() }));
            }
        }
        Ok(found)
    }
}

fn format_checkpoint_name(seq: u32, label: &str) -> String {
    format!("{seq:0width$}{label}.chk", width = SEQUENCE_DIGITS)
}

/// Parses the leading 8-digit sequence number from a `.chk` filename,
/// matching `^\d{8}.*\.chk$`.
fn parse_sequence(name: &str) -> Option<u32> {
    if !name.ends_with(".chk") || name.len() < SEQUENCE_DIGITS + 4 {
        return None;
    }
    let prefix = &name[..SEQUENCE_DIGITS];
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    fn store() -> (CheckpointStore, CancellationToken) {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
        (CheckpointStore::new(fs, "ckpt", 0o755), CancellationToken::new())
    }

    #[tokio::test]
    async fn init_twice_fails() {
        let (store, token) = store();
        store.init(&token).await.unwrap();
        assert!(matches!(store.init(&token).await, Err(CheckpointError::AlreadyInitialized)));
    }

    #[tokio::test]
    async fn checkpoint_ids_increase_and_latest_returns_newest() {
        let (store, token) = store();
        store.init(&token).await.unwrap();
        let id1 = store.checkpoint("start", b"one", &token).await.unwrap();
        let id2 = store.checkpoint("mid", b"two", &token).await.unwrap();
        assert!(id1 < id2);
        assert_eq!(store.latest(&token).await.unwrap(), Some(b"two".to_vec()));
    }

    #[tokio::test]
    async fn load_fetches_by_returned_id() {
        let (store, token) = store();
        store.init(&token).await.unwrap();
        let id = store.checkpoint("x", b"payload", &token).await.unwrap();
        assert_eq!(store.load(&id, &token).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn latest_on_empty_store_is_none() {
        let (store, token) = store();
        store.init(&token).await.unwrap();
        assert_eq!(store.latest(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn compact_collapses_to_single_zeroed_entry() {
        let (store, token) = store();
        store.init(&token).await.unwrap();
        store.checkpoint("a", b"one", &token).await.unwrap();
        store.checkpoint("b", b"two", &token).await.unwrap();
        let compacted_id = store.compact("final", &token).await.unwrap();
        assert!(compacted_id.starts_with("00000000"));
        assert_eq!(store.latest(&token).await.unwrap(), Some(b"two".to_vec()));
        // Only one file should remain.
        let next_id = store.checkpoint("next", b"three", &token).await.unwrap();
        assert!(next_id.starts_with("00000001"));
    }

    #[tokio::test]
    async fn compact_on_empty_store_errors() {
        let (store, token) = store();
        store.init(&token).await.unwrap();
        assert!(matches!(store.compact("x", &token).await, Err(CheckpointError::NothingToCompact)));
    }

    #[tokio::test]
    async fn clear_removes_all_files() {
        let (store, token) = store();
        store.init(&token).await.unwrap();
        store.checkpoint("a", b"one", &token).await.unwrap();
        store.clear(&token).await.unwrap();
        assert_eq!(store.latest(&token).await.unwrap(), None);
    }
}
