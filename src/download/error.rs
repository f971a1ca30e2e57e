//! Errors surfaced by [`super::DownloaderPool::run`].

use std::fmt;

/// Errors a downloader pool run can fail with.
///
/// Per-name failures never appear here — they're reported in-band via
/// `FetchResult::err`. Only cancellation and worker-level faults reach
/// this type, matching §7's `Cancelled`/`Fatal` kinds.
#[derive(Debug)]
pub enum DownloaderError {
    /// The run's `CancellationToken` was cancelled.
    Cancelled,

    /// Channel misuse, a worker panic, or another programming error.
    Fatal(String),

    /// Aggregates one error per worker task that failed.
    Multi(Vec<DownloaderError>),
}

impl fmt::Display for DownloaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloaderError::Cancelled => write!(f, "downloader pool cancelled"),
            DownloaderError::Fatal(msg) => write!(f, "downloader pool fatal error: {msg}"),
            DownloaderError::Multi(errors) => {
                write!(f, "{} worker(s) failed: ", errors.len())?;
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for DownloaderError {}

impl DownloaderError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            DownloaderError::Cancelled => true,
            DownloaderError::Multi(errs) => errs.iter().any(DownloaderError::is_cancelled),
            DownloaderError::Fatal(_) => false,
        }
    }
}
