//! In-memory [`Fs`] test double.
//!
//! Grounded in the split the broader storage-abstraction ecosystem draws
//! between one real backend and one in-memory double kept purely for fast,
//! deterministic tests: no real I/O latency, no filesystem cleanup.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use super::{DirEntry, FileInfo, Fs, FsError, LevelScanner};

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    modtime: SystemTime,
}

/// An in-memory object store keyed by path string.
///
/// Directories are implicit: any path is "inside" a prefix if it starts
/// with `prefix` plus a separator. `simulate_missing_prefix` makes `put`
/// behave like a backend that requires the parent prefix to have been
/// created via `ensure_prefix` first.
#[derive(Debug, Default)]
pub struct MemFs {
    objects: DashMap<String, Entry>,
    prefixes: DashMap<String, ()>,
    simulate_missing_prefix: bool,
    /// Paths that should fail with a retryable error the next N times they
    /// are opened, decremented on each attempt. Used to exercise retry
    /// logic deterministically in tests.
    fail_open_n_times: Mutex<BTreeMap<String, u32>>,
}

impl MemFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a `MemFs` where `put` fails with `NotExist` unless the
    /// parent prefix was created with `ensure_prefix` first.
    #[must_use]
    pub fn with_prefix_enforcement() -> Self {
        Self {
            simulate_missing_prefix: true,
            ..Self::default()
        }
    }

    /// Arranges for `path` to fail with a retryable error the next `n`
    /// times it is opened, then succeed normally.
    #[allow(clippy::expect_used)]
    pub fn fail_next_opens(&self, path: &str, n: u32) {
        self.fail_open_n_times
            .lock()
            .expect("lock poisoned")
            .insert(path.to_string(), n);
    }

    fn parent_of(path: &str) -> String {
        match path.rfind('/') {
            Some(idx) => path[..idx].to_string(),
            None => String::new(),
        }
    }
}

#[async_trait]
impl Fs for MemFs {
    #[allow(clippy::expect_used)]
    async fn open(&self, path: &str, token: &CancellationToken) -> Result<(Vec<u8>, FileInfo), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: path.to_string() });
        }
        {
            let mut guard = self.fail_open_n_times.lock().expect("lock poisoned");
            if let Some(remaining) = guard.get_mut(path) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FsError::Retryable {
                        path: path.to_string(),
                        source: Box::new(std::io::Error::other("injected failure")),
                    });
                }
            }
        }
        match self.objects.get(path) {
            Some(entry) => Ok((
                entry.data.clone(),
                FileInfo {
                    size: entry.data.len() as u64,
                    modtime: Some(entry.modtime),
                    is_dir: false,
                },
            )),
            None => Err(FsError::NotExist {
                path: path.to_string(),
            }),
        }
    }

    async fn put(
        &self,
        path: &str,
        _mode: u32,
        data: &[u8],
        token: &CancellationToken,
    ) -> Result<(), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: path.to_string() });
        }
        if self.simulate_missing_prefix {
            let parent = Self::parent_of(path);
            if !parent.is_empty() && !self.prefixes.contains_key(&parent) {
                return Err(FsError::NotExist {
                    path: path.to_string(),
                });
            }
        }
        self.objects.insert(
            path.to_string(),
            Entry {
                data: data.to_vec(),
                modtime: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn ensure_prefix(&self, prefix: &str, _mode: u32, token: &CancellationToken) -> Result<(), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: prefix.to_string() });
        }
        self.prefixes.insert(prefix.to_string(), ());
        Ok(())
    }

    async fn delete(&self, path: &str, token: &CancellationToken) -> Result<(), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: path.to_string() });
        }
        self.objects.remove(path);
        Ok(())
    }

    async fn delete_all(&self, prefix: &str, token: &CancellationToken) -> Result<(), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: prefix.to_string() });
        }
        let needle = format!("{prefix}/");
        self.objects
            .retain(|k, _| !(k.starts_with(&needle) || k == prefix));
        self.prefixes.remove(prefix);
        Ok(())
    }

    async fn stat(&self, path: &str, token: &CancellationToken) -> Result<FileInfo, FsError> {
        self.open(path, token).await.map(|(_, info)| info)
    }

    fn level_scanner(&self, prefix: &str, batch_size: usize) -> Box<dyn LevelScanner> {
        let needle = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        let mut names: Vec<DirEntry> = self
            .objects
            .iter()
            .filter_map(|entry| {
                let key = entry.key();
                let rest = key.strip_prefix(&needle)?;
                if rest.is_empty() || rest.contains('/') {
                    return None;
                }
                Some(DirEntry {
                    name: rest.to_string(),
                    is_dir: false,
                })
            })
            .collect();
        names.sort_by(|a, b| a.name.cmp(&b.name));
        Box::new(MemLevelScanner {
            entries: names,
            offset: 0,
            batch_size,
        })
    }
}

struct MemLevelScanner {
    entries: Vec<DirEntry>,
    offset: usize,
    batch_size: usize,
}

#[async_trait]
impl LevelScanner for MemLevelScanner {
    async fn next_batch(&mut self) -> Result<Vec<DirEntry>, FsError> {
        if self.offset >= self.entries.len() {
            return Ok(Vec::new());
        }
        let end = (self.offset + self.batch_size).min(self.entries.len());
        let batch = self.entries[self.offset..end].to_vec();
        self.offset = end;
        Ok(batch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let fs = MemFs::new();
        let token = CancellationToken::new();
        fs.put("x", 0o644, b"data", &token).await.unwrap();
        assert_eq!(fs.get("x", &token).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn fail_next_opens_then_succeeds() {
        let fs = MemFs::new();
        let token = CancellationToken::new();
        fs.put("x", 0o644, b"data", &token).await.unwrap();
        fs.fail_next_opens("x", 2);
        assert!(fs.open("x", &token).await.unwrap_err().is_retryable());
        assert!(fs.open("x", &token).await.unwrap_err().is_retryable());
        assert_eq!(fs.open("x", &token).await.unwrap().0, b"data");
    }

    #[tokio::test]
    async fn prefix_enforcement_rejects_put_without_ensure() {
        let fs = MemFs::with_prefix_enforcement();
        let token = CancellationToken::new();
        let err = fs.put("dir/file", 0o644, b"x", &token).await.unwrap_err();
        assert!(err.is_not_exist());
        fs.ensure_prefix("dir", 0o755, &token).await.unwrap();
        fs.put("dir/file", 0o644, b"x", &token).await.unwrap();
    }
}
