//! Errors surfaced by [`super::Crawler::run`].

use std::fmt;

use crate::download::DownloaderError;

/// Aggregated failure from a crawl run.
#[derive(Debug)]
pub enum CrawlError {
    /// The run's `CancellationToken` was cancelled before completion.
    Cancelled,

    /// A depth's downloader pool failed.
    Downloader { depth: u32, source: DownloaderError },

    /// A pipeline stage task panicked or was otherwise lost.
    Join(String),

    /// Aggregates failures from more than one depth.
    Multi(Vec<CrawlError>),
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlError::Cancelled => write!(f, "crawl was cancelled"),
            CrawlError::Downloader { depth, source } => {
                write!(f, "downloader at depth {depth} failed: {source}")
            }
            CrawlError::Join(msg) => write!(f, "crawl pipeline task failed: {msg}"),
            CrawlError::Multi(errors) => {
                write!(f, "{} depth(s) failed during crawl: ", errors.len())?;
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

impl std::error::Error for CrawlError {}

impl CrawlError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            CrawlError::Cancelled => true,
            CrawlError::Multi(errs) => errs.iter().any(CrawlError::is_cancelled),
            CrawlError::Downloader { .. } | CrawlError::Join(_) => false,
        }
    }
}
