//! Builds the per-depth downloader pool the orchestrator drives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::download::{DownloaderPool, DownloaderPoolConfig, ProgressUpdate};
use crate::rate::RateController;

/// Supplies one [`DownloaderPool`] and its channel capacities per depth.
///
/// Depths `0..=max_depth` are each asked for exactly one pool; the
/// orchestrator owns the request/downloaded channels themselves.
pub trait DownloaderFactory: Send + Sync {
    /// Builds the pool that will run at `depth`.
    fn build(&self, depth: u32) -> DownloaderPool;

    /// Capacity of `requests[depth]`.
    fn request_chan_size(&self, depth: u32) -> usize;

    /// Capacity of `downloaded[depth]`.
    fn downloaded_chan_size(&self, depth: u32) -> usize;
}

/// A factory that builds identically configured pools at every depth,
/// optionally overriding concurrency for specific depths.
///
/// Grounded in the teacher's `EngineConfig`'s `per_domain` override map:
/// a flat default plus a sparse list of depth-indexed exceptions.
pub struct UniformDownloaderFactory {
    rate: Arc<dyn RateController>,
    default_concurrency: usize,
    per_depth_concurrency: Vec<(u32, usize)>,
    request_chan_size: usize,
    downloaded_chan_size: usize,
    progress: Option<(mpsc::Sender<ProgressUpdate>, Duration)>,
}

impl UniformDownloaderFactory {
    #[must_use]
    pub fn new(
        rate: Arc<dyn RateController>,
        default_concurrency: usize,
        request_chan_size: usize,
        downloaded_chan_size: usize,
    ) -> Self {
        Self {
            rate,
            default_concurrency,
            per_depth_concurrency: Vec::new(),
            request_chan_size,
            downloaded_chan_size,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_depth_override(mut self, depth: u32, concurrency: usize) -> Self {
        self.per_depth_concurrency.push((depth, concurrency));
        self
    }

    #[must_use]
    pub fn with_progress(mut self, sender: mpsc::Sender<ProgressUpdate>, interval: Duration) -> Self {
        self.progress = Some((sender, interval));
        self
    }

    fn concurrency_for(&self, depth: u32) -> usize {
        self.per_depth_concurrency
            .iter()
            .find(|(d, _)| *d == depth)
            .map_or(self.default_concurrency, |(_, c)| *c)
    }
}

impl DownloaderFactory for UniformDownloaderFactory {
    fn build(&self, depth: u32) -> DownloaderPool {
        let mut config = DownloaderPoolConfig::new(self.concurrency_for(depth));
        if let Some((sender, interval)) = &self.progress {
            config = config.with_progress(sender.clone(), *interval);
        }
        DownloaderPool::new(config, Arc::clone(&self.rate))
    }

    fn request_chan_size(&self, _depth: u32) -> usize {
        self.request_chan_size
    }

    fn downloaded_chan_size(&self, _depth: u32) -> usize {
        self.downloaded_chan_size
    }
}
