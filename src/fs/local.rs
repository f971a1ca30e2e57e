//! Local-disk backed [`Fs`] implementation.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs as tfs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{DirEntry, FileInfo, Fs, FsError, LevelScanner};

/// Rooted at `root`; every path is joined onto it before touching disk.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

fn io_to_fs(path: &str, err: io::Error) -> FsError {
    match err.kind() {
        io::ErrorKind::NotFound => FsError::NotExist {
            path: path.to_string(),
        },
        io::ErrorKind::PermissionDenied => FsError::Permission {
            path: path.to_string(),
        },
        _ => FsError::Retryable {
            path: path.to_string(),
            source: Box::new(err),
        },
    }
}

async fn metadata_to_info(meta: std::fs::Metadata) -> FileInfo {
    FileInfo {
        size: meta.len(),
        modtime: meta.modified().ok(),
        is_dir: meta.is_dir(),
    }
}

#[async_trait]
impl Fs for LocalFs {
    #[instrument(skip(self, token), fields(path))]
    async fn open(&self, path: &str, token: &CancellationToken) -> Result<(Vec<u8>, FileInfo), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: path.to_string() });
        }
        let full = self.resolve(path);
        let meta = tfs::metadata(&full)
            .await
            .map_err(|e| io_to_fs(path, e))?;
        let bytes = tfs::read(&full).await.map_err(|e| io_to_fs(path, e))?;
        Ok((bytes, metadata_to_info(meta).await))
    }

    #[instrument(skip(self, data, token), fields(path, len = data.len()))]
    async fn put(
        &self,
        path: &str,
        mode: u32,
        data: &[u8],
        token: &CancellationToken,
    ) -> Result<(), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: path.to_string() });
        }
        let full = self.resolve(path);
        let parent = full.parent().unwrap_or(Path::new("."));
        if !tfs::try_exists(parent).await.unwrap_or(false) {
            return Err(FsError::NotExist {
                path: path.to_string(),
            });
        }

        // Write to a sibling temp file then rename, so readers never see a
        // partially written object.
        let tmp = full.with_extension(format!("tmp-{}", std::process::id()));
        let mut file = tfs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .await
            .map_err(|e| io_to_fs(path, e))?;
        file.write_all(data).await.map_err(|e| io_to_fs(path, e))?;
        file.flush().await.map_err(|e| io_to_fs(path, e))?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perm = std::fs::Permissions::from_mode(mode);
            let _ = tfs::set_permissions(&tmp, perm).await;
        }
        let _ = mode;

        tfs::rename(&tmp, &full).await.map_err(|e| io_to_fs(path, e))?;
        debug!("wrote object");
        Ok(())
    }

    async fn ensure_prefix(&self, prefix: &str, _mode: u32, token: &CancellationToken) -> Result<(), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: prefix.to_string() });
        }
        let full = self.resolve(prefix);
        tfs::create_dir_all(&full)
            .await
            .map_err(|e| io_to_fs(prefix, e))
    }

    async fn delete(&self, path: &str, token: &CancellationToken) -> Result<(), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: path.to_string() });
        }
        let full = self.resolve(path);
        match tfs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_to_fs(path, e)),
        }
    }

    async fn delete_all(&self, prefix: &str, token: &CancellationToken) -> Result<(), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: prefix.to_string() });
        }
        let full = self.resolve(prefix);
        match tfs::remove_dir_all(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_to_fs(prefix, e)),
        }
    }

    async fn stat(&self, path: &str, token: &CancellationToken) -> Result<FileInfo, FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled { path: path.to_string() });
        }
        let full = self.resolve(path);
        let meta = tfs::metadata(&full).await.map_err(|e| io_to_fs(path, e))?;
        Ok(metadata_to_info(meta).await)
    }

    fn level_scanner(&self, prefix: &str, batch_size: usize) -> Box<dyn LevelScanner> {
        Box::new(LocalLevelScanner {
            dir: self.resolve(prefix),
            batch_size,
            read_dir: None,
            exhausted: false,
        })
    }

    fn join(&self, segments: &[&str]) -> String {
        segments
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(std::path::MAIN_SEPARATOR_STR)
    }
}

struct LocalLevelScanner {
    dir: PathBuf,
    batch_size: usize,
    read_dir: Option<tfs::ReadDir>,
    exhausted: bool,
}

#[async_trait]
impl LevelScanner for LocalLevelScanner {
    #[allow(clippy::expect_used)]
    async fn next_batch(&mut self) -> Result<Vec<DirEntry>, FsError> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let path_str = self.dir.display().to_string();
        if self.read_dir.is_none() {
            match tfs::read_dir(&self.dir).await {
                Ok(rd) => self.read_dir = Some(rd),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    self.exhausted = true;
                    return Ok(Vec::new());
                }
                Err(e) => return Err(io_to_fs(&path_str, e)),
            }
        }

        let rd = self.read_dir.as_mut().expect("initialized above");
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match rd.next_entry().await.map_err(|e| io_to_fs(&path_str, e))? {
                Some(entry) => {
                    let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                    batch.push(DirEntry {
                        name: entry.file_name().to_string_lossy().into_owned(),
                        is_dir,
                    });
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_open_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = LocalFs::new(dir.path());
        let token = CancellationToken::new();
        fs.put("a/b.txt", 0o644, b"hello", &token).await.unwrap();
        let (bytes, info) = fs.open("a/b.txt", &token).await.unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(info.size, 5);
    }

    #[tokio::test]
    async fn open_missing_is_not_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = LocalFs::new(dir.path());
        let token = CancellationToken::new();
        let err = fs.open("missing.txt", &token).await.unwrap_err();
        assert!(err.is_not_exist());
    }

    #[tokio::test]
    async fn put_without_prefix_fails_not_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = LocalFs::new(dir.path());
        let token = CancellationToken::new();
        let err = fs
            .put("missing-dir/file.txt", 0o644, b"x", &token)
            .await
            .unwrap_err();
        assert!(err.is_not_exist());
    }

    #[tokio::test]
    async fn ensure_prefix_then_put_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = LocalFs::new(dir.path());
        let token = CancellationToken::new();
        fs.ensure_prefix("nested/dir", 0o755, &token).await.unwrap();
        fs.put("nested/dir/file.txt", 0o644, b"x", &token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn level_scanner_batches_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = LocalFs::new(dir.path());
        let token = CancellationToken::new();
        for i in 0..5 {
            fs.put(&format!("f{i}.txt"), 0o644, b"x", &token)
                .await
                .unwrap();
        }
        let mut scanner = fs.level_scanner("", 2);
        let mut total = 0;
        loop {
            let batch = scanner.next_batch().await.unwrap();
            if batch.is_empty() {
                break;
            }
            assert!(batch.len() <= 2);
            total += batch.len();
        }
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn delete_all_removes_recursively() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = LocalFs::new(dir.path());
        let token = CancellationToken::new();
        fs.ensure_prefix("p", 0o755, &token).await.unwrap();
        fs.put("p/a.txt", 0o644, b"x", &token).await.unwrap();
        fs.delete_all("p", &token).await.unwrap();
        assert!(fs.open("p/a.txt", &token).await.unwrap_err().is_not_exist());
    }

    #[tokio::test]
    async fn delete_all_on_absent_prefix_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = LocalFs::new(dir.path());
        let token = CancellationToken::new();
        fs.delete_all("never-existed", &token).await.unwrap();
    }
}
