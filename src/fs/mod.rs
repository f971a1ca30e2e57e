//! The abstract object filesystem the engine is built against.
//!
//! `Fs` is the capability set every other component depends on: `Open`,
//! `Get`, `Put`, `Delete`, `DeleteAll`, `EnsurePrefix`, `Join`, `Stat`, and
//! `LevelScanner`. Any concrete backend — local disk, an HTTP origin, an
//! object store, or a test double — can be plugged in by implementing this
//! trait. All methods are async and accept a [`CancellationToken`] for
//! deadline propagation.

mod http;
mod local;
mod mem;

pub use http::HttpFs;
pub use local::LocalFs;
pub use mem::MemFs;

use std::fmt;
use std::time::SystemTime;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors the `Fs` contract can surface.
///
/// Mirrors §7's abstract error kinds that are FS-shaped: `Retryable`,
/// `NotExist`, `Permission`, and `Cancelled`. `Other` covers anything a
/// concrete backend needs to pass through without losing information.
#[derive(Debug, Error)]
pub enum FsError {
    /// Target object (or its parent prefix) is absent.
    #[error("not found: {path}")]
    NotExist { path: String },

    /// Transient failure a `RateController` may recognize as retryable.
    #[error("retryable error on {path}: {source}")]
    Retryable {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Access to the object was denied.
    #[error("permission denied: {path}")]
    Permission { path: String },

    /// The operation was cancelled via its `CancellationToken`.
    #[error("operation on {path} was cancelled")]
    Cancelled { path: String },

    /// Any other backend-specific failure.
    #[error("fs error on {path}: {source}")]
    Other {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl FsError {
    #[must_use]
    pub fn is_not_exist(&self) -> bool {
        matches!(self, FsError::NotExist { .. })
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, FsError::Retryable { .. })
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FsError::Cancelled { .. })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            FsError::NotExist { path }
            | FsError::Retryable { path, .. }
            | FsError::Permission { path }
            | FsError::Cancelled { path }
            | FsError::Other { path, .. } => path,
        }
    }
}

/// Metadata returned alongside an opened or stat'd object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub modtime: Option<SystemTime>,
    pub is_dir: bool,
}

/// One entry returned by a `LevelScanner` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Forward iterator over the immediate children of a prefix, in
/// caller-supplied batch sizes.
#[async_trait]
pub trait LevelScanner: Send + Sync {
    /// Returns the next batch (up to the configured size), or an empty
    /// vector once exhausted.
    async fn next_batch(&mut self) -> Result<Vec<DirEntry>, FsError>;
}

/// The capability set the crawl engine depends on.
///
/// Implementors must treat every method as blocking (from the caller's
/// point of view) and must honor `token` for deadline/cancellation
/// propagation at every suspension point.
#[async_trait]
pub trait Fs: Send + Sync + fmt::Debug {
    /// Opens `path` for reading, returning its bytes and metadata.
    ///
    /// Fails with [`FsError::NotExist`] if the object is absent.
    async fn open(&self, path: &str, token: &CancellationToken) -> Result<(Vec<u8>, FileInfo), FsError>;

    /// Eagerly reads `path`. Same error classes as [`Fs::open`].
    async fn get(&self, path: &str, token: &CancellationToken) -> Result<Vec<u8>, FsError> {
        self.open(path, token).await.map(|(bytes, _)| bytes)
    }

    /// Writes `data` to `path` with the given mode.
    ///
    /// May fail with [`FsError::NotExist`] if the parent prefix does not
    /// exist; callers retry after `ensure_prefix`.
    async fn put(
        &self,
        path: &str,
        mode: u32,
        data: &[u8],
        token: &CancellationToken,
    ) -> Result<(), FsError>;

    /// Idempotent directory-or-equivalent creation.
    async fn ensure_prefix(&self, prefix: &str, mode: u32, token: &CancellationToken) -> Result<(), FsError>;

    /// Removes `path`. Silent if the object does not exist.
    async fn delete(&self, path: &str, token: &CancellationToken) -> Result<(), FsError>;

    /// Recursively removes everything under `prefix`. No error if absent.
    async fn delete_all(&self, prefix: &str, token: &CancellationToken) -> Result<(), FsError>;

    /// Returns metadata for `path` without reading its contents.
    async fn stat(&self, path: &str, token: &CancellationToken) -> Result<FileInfo, FsError>;

    /// Returns a forward iterator over `prefix`'s immediate children,
    /// delivered in batches of at most `batch_size`.
    fn level_scanner(&self, prefix: &str, batch_size: usize) -> Box<dyn LevelScanner>;

    /// Composes path segments using this backend's separator.
    fn join(&self, segments: &[&str]) -> String {
        segments
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Predicate used for control flow, mirroring `Fs::IsNotExist`.
#[must_use]
pub fn is_not_exist(err: &FsError) -> bool {
    err.is_not_exist()
}
