//! Per-depth pipeline wiring and lifecycle.
//!
//! Grounded in the teacher's `download::engine::Engine::run` top-level
//! orchestration (spawn, join, aggregate errors) generalized from a single
//! flat worker pool into the spec's depth-chained
//! `downloader → extractor → next depth` pipeline. The channel-closing
//! cascade is expressed through ownership rather than an explicit `Close`
//! call: each stage owns exactly one sender for the channel it feeds, so
//! that channel closes automatically once the stage's task exits.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::error::CrawlError;
use super::factory::DownloaderFactory;
use crate::extract::{DedupSet, ExtractErrors, ExtractorPool, ExtractorPoolConfig, HandlerRegistry};
use crate::link::LinkProcessor;
use crate::types::{Crawled, Request};

/// Configuration for a [`Crawler`] run.
pub struct CrawlerConfig {
    /// Traversal stops producing outlinks once this depth is reached.
    pub max_depth: u32,
    /// Extractor pool concurrency, applied uniformly across depths.
    pub num_extractors: usize,
    /// Capacity of the decoupling pipe between user input and `requests[0]`,
    /// and between each depth's downloaded stream and its extractor input.
    pub pipe_chan_size: usize,
}

/// Wires a chain of per-depth downloader and extractor pools into one
/// bounded-depth breadth-first crawl.
pub struct Crawler {
    config: CrawlerConfig,
    downloader_factory: Arc<dyn DownloaderFactory>,
    registry: Arc<HandlerRegistry>,
    link_processor: Arc<LinkProcessor>,
}

impl Crawler {
    #[must_use]
    pub fn new(
        config: CrawlerConfig,
        downloader_factory: Arc<dyn DownloaderFactory>,
        registry: Arc<HandlerRegistry>,
        link_processor: Arc<LinkProcessor>,
    ) -> Self {
        Self {
            config,
            downloader_factory,
            registry,
            link_processor,
        }
    }

    /// Runs the crawl to completion.
    ///
    /// `seeds` feeds depth-0 requests; closing it begins the shutdown
    /// cascade described in the module documentation. `crawled_tx` receives
    /// every `Crawled` record produced at every depth, in no particular
    /// cross-request order. `extract_errors_tx`, if given, receives
    /// non-fatal per-artifact extraction failures from every depth.
    #[instrument(skip_all, fields(max_depth = self.config.max_depth))]
    #[allow(clippy::expect_used)]
    pub async fn run(
        self,
        seeds: mpsc::Receiver<Request>,
        crawled_tx: mpsc::Sender<Crawled>,
        extract_errors_tx: Option<mpsc::Sender<ExtractErrors>>,
        token: CancellationToken,
    ) -> Result<(), CrawlError> {
        let max_depth = self.config.max_depth;
        let dedup_sets: Vec<Arc<DedupSet>> = (0..=max_depth).map(|_| Arc::new(DedupSet::new())).collect();

        let mut request_txs = Vec::with_capacity(max_depth as usize + 1);
        let mut request_rxs = Vec::with_capacity(max_depth as usize + 1);
        for depth in 0..=max_depth {
            let (tx, rx) = mpsc::channel(self.downloader_factory.request_chan_size(depth));
            request_txs.push(tx);
            request_rxs.push(rx);
        }

        let mut handles: Vec<JoinHandle<Result<(), CrawlError>>> = Vec::new();

        // Pipe stage: decouples the user's seed channel from requests[0].
        let requests0_tx = request_txs[0].clone();
        handles.push(tokio::spawn(spawn_pipe(seeds, requests0_tx, token.clone())));

        for depth in 0..=max_depth {
            let request_rx = request_rxs.remove(0);
            let downloader = self.downloader_factory.build(depth);
            let downloaded_chan_size = self.downloader_factory.downloaded_chan_size(depth);
            let (downloaded_tx, downloaded_rx) = mpsc::channel(downloaded_chan_size);
            let dl_token = token.clone();

            debug!(depth, "spawning downloader pool");
            handles.push(tokio::spawn(async move {
                downloader
                    .run(request_rx, downloaded_tx, dl_token)
                    .await
                    .map_err(|source| CrawlError::Downloader { depth, source })
            }));

            // Pipe stage between the downloader's output and the extractor's
            // input, decoupling their channel capacities.
            let (extractor_in_tx, extractor_in_rx) = mpsc::channel(self.config.pipe_chan_size);
            handles.push(tokio::spawn(spawn_pipe(downloaded_rx, extractor_in_tx, token.clone())));

            let extractor = ExtractorPool::new(
                ExtractorPoolConfig::new(self.config.num_extractors, max_depth),
                Arc::clone(&self.registry),
                Arc::clone(&self.link_processor),
                Arc::clone(&dedup_sets[depth as usize]) as Arc<dyn crate::extract::IsDup>,
            );
            let (extracted_tx, mut extracted_rx) = mpsc::channel(self.config.pipe_chan_size);
            let extract_errors_tx = extract_errors_tx.clone();
            let ext_token = token.clone();
            handles.push(tokio::spawn(async move {
                extractor.run(extractor_in_rx, extracted_tx, extract_errors_tx, ext_token).await;
                Ok(())
            }));

            // Fan the extractor's output into the user channel and, for every
            // outlink, into the next depth's request channel. This task is
            // the sole owner of `requests[depth+1]`'s sending half, so that
            // channel closes automatically once this task exits.
            let next_request_tx = if depth < max_depth {
                Some(request_txs[depth as usize + 1].clone())
            } else {
                None
            };
            let user_tx = crawled_tx.clone();
            let fan_token = token.clone();
            handles.push(tokio::spawn(async move {
                while let Some(crawled) = extracted_rx.recv().await {
                    if let Some(next_tx) = &next_request_tx {
                        for outlink in &crawled.outlinks {
                            tokio::select! {
                                biased;
                                () = fan_token.cancelled() => return Err(CrawlError::Cancelled),
                                send_result = next_tx.send(outlink.clone()) => {
                                    if send_result.is_err() {
                                        return Ok(());
                                    }
                                }
                            }
                        }
                    }
                    if user_tx.send(crawled).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(())
            }));
        }
        // Drop the orchestrator's own clones; the per-depth tasks above hold
        // the senders that actually keep each channel alive.
        drop(request_txs);
        drop(crawled_tx);

        let mut errors = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(join_err) => errors.push(CrawlError::Join(join_err.to_string())),
            }
        }

        info!(errors = errors.len(), "crawl finished");
        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.into_iter().next().expect("len checked above"))
        } else {
            Err(CrawlError::Multi(errors))
        }
    }
}

/// Forwards every item from `rx` to `tx`, honoring cancellation, and lets
/// `tx` close naturally on exit.
async fn spawn_pipe<T: Send + 'static>(
    mut rx: mpsc::Receiver<T>,
    tx: mpsc::Sender<T>,
    token: CancellationToken,
) -> Result<(), CrawlError> {
    loop {
        let item = tokio::select! {
            biased;
            () = token.cancelled() => return Err(CrawlError::Cancelled),
            item = rx.recv() => item,
        };
        let Some(item) = item else {
            return Ok(());
        };
        tokio::select! {
            biased;
            () = token.cancelled() => return Err(CrawlError::Cancelled),
            send_result = tx.send(item) => {
                if send_result.is_err() {
                    return Ok(());
                }
            }
        }
    }
}
