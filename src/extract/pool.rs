//! Extractor worker pool: turns `Downloaded` batches into `Crawled` records.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::dedup::IsDup;
use super::registry::HandlerRegistry;
use crate::fs::{Fs, FsError};
use crate::link::LinkProcessor;
use crate::types::{Crawled, Downloaded, FetchResult, Request};

/// A single extraction failure for one name within a `Downloaded`.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No handler is registered for the (normalized) content type.
    #[error("no link handler registered for content type {content_type:?}")]
    NoHandler { content_type: String },

    /// Re-opening the artifact's bytes via the container `Fs` failed.
    #[error("failed to open {name} for extraction: {source}")]
    Fetch { name: String, source: FsError },
}

/// Non-fatal extraction failures for one `Downloaded`, surfaced on the
/// pool's optional error channel.
#[derive(Debug)]
pub struct ExtractErrors {
    pub requested_by: String,
    pub failures: Vec<(String, ExtractError)>,
}

/// Configuration for an [`ExtractorPool`].
pub struct ExtractorPoolConfig {
    /// Number of concurrent worker tasks.
    pub concurrency: usize,
    /// Crawl-wide maximum depth; no outlinks are emitted at this depth.
    pub max_depth: u32,
    /// Content type assumed for names with no recognized extension.
    pub default_content_type: String,
}

impl ExtractorPoolConfig {
    #[must_use]
    pub fn new(concurrency: usize, max_depth: u32) -> Self {
        let concurrency = if concurrency == 0 {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        } else {
            concurrency
        };
        Self {
            concurrency,
            max_depth,
            default_content_type: "application/octet-stream".to_string(),
        }
    }
}

/// Per-content-type outlink extraction with dedup and next-depth request
/// creation.
///
/// One instance is scoped to a single depth's output: its [`IsDup`] set is
/// fresh per instance, matching the spec's "per-extractor instance scope"
/// dedup invariant.
pub struct ExtractorPool {
    config: ExtractorPoolConfig,
    registry: Arc<HandlerRegistry>,
    link_processor: Arc<LinkProcessor>,
    dedup: Arc<dyn IsDup>,
}

impl ExtractorPool {
    #[must_use]
    pub fn new(
        config: ExtractorPoolConfig,
        registry: Arc<HandlerRegistry>,
        link_processor: Arc<LinkProcessor>,
        dedup: Arc<dyn IsDup>,
    ) -> Self {
        Self {
            config,
            registry,
            link_processor,
            dedup,
        }
    }

    /// Runs the pool until `input` closes and all in-flight work drains,
    /// then closes `crawled_tx`.
    #[instrument(skip_all, fields(concurrency = self.config.concurrency, max_depth = self.config.max_depth))]
    pub async fn run(
        self,
        input: mpsc::Receiver<Downloaded>,
        crawled_tx: mpsc::Sender<Crawled>,
        errors_tx: Option<mpsc::Sender<ExtractErrors>>,
        token: CancellationToken,
    ) {
        let shared_rx = Arc::new(Mutex::new(input));
        info!("starting extractor pool");

        let mut handles = Vec::with_capacity(self.config.concurrency);
        let registry = Arc::clone(&self.registry);
        let link_processor = Arc::clone(&self.link_processor);
        let dedup = Arc::clone(&self.dedup);
        let max_depth = self.config.max_depth;
        let default_content_type = self.config.default_content_type.clone();

        for worker_id in 0..self.config.concurrency {
            let rx = Arc::clone(&shared_rx);
            let tx = crawled_tx.clone();
            let err_tx = errors_tx.clone();
            let registry = Arc::clone(&registry);
            let link_processor = Arc::clone(&link_processor);
            let dedup = Arc::clone(&dedup);
            let default_content_type = default_content_type.clone();
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(
                    worker_id,
                    rx,
                    tx,
                    err_tx,
                    registry,
                    link_processor,
                    dedup,
                    max_depth,
                    default_content_type,
                    token,
                )
                .await;
            }));
        }
        drop(crawled_tx);

        for handle in handles {
            let _ = handle.await;
        }
        info!("extractor pool finished");
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Downloaded>>>,
    tx: mpsc::Sender<Crawled>,
    err_tx: Option<mpsc::Sender<ExtractErrors>>,
    registry: Arc<HandlerRegistry>,
    link_processor: Arc<LinkProcessor>,
    dedup: Arc<dyn IsDup>,
    max_depth: u32,
    default_content_type: String,
    token: CancellationToken,
) {
    loop {
        let downloaded = {
            let mut guard = rx.lock().await;
            tokio::select! {
                biased;
                () = token.cancelled() => return,
                item = guard.recv() => item,
            }
        };
        let Some(downloaded) = downloaded else {
            debug!(worker_id, "downloaded channel closed, extractor worker exiting");
            return;
        };

        let depth = downloaded.request.depth;
        let next_depth = depth + 1;
        let emit_outlinks = depth < max_depth;

        let mut failures = Vec::new();
        let mut outlinks = Vec::with_capacity(downloaded.results.len());

        for result in &downloaded.results {
            if !result.is_ok() {
                continue;
            }
            if !emit_outlinks {
                continue;
            }
            match extract_one(
                result,
                &downloaded.request.container,
                &registry,
                &link_processor,
                &dedup,
                &default_content_type,
                &token,
            )
            .await
            {
                Ok(names) if names.is_empty() => {}
                Ok(names) => outlinks.push(Request::new(result.name.clone(), Arc::clone(&downloaded.request.container), next_depth)
                    .with_names(names)
                    .with_mode(downloaded.request.mode)),
                Err(e) => {
                    warn!(worker_id, name = result.name, "extraction failed: {e}");
                    failures.push((result.name.clone(), e));
                }
            }
        }

        if !failures.is_empty() {
            if let Some(err_tx) = &err_tx {
                let _ = err_tx.try_send(ExtractErrors {
                    requested_by: downloaded.request.requested_by.clone(),
                    failures,
                });
            }
        }

        let crawled = Crawled {
            downloaded,
            outlinks,
            depth,
        };
        tokio::select! {
            biased;
            () = token.cancelled() => return,
            send_result = tx.send(crawled) => {
                if send_result.is_err() {
                    return;
                }
            }
        }
    }
}

async fn extract_one(
    result: &FetchResult,
    container: &Arc<dyn Fs>,
    registry: &HandlerRegistry,
    link_processor: &LinkProcessor,
    dedup: &Arc<dyn IsDup>,
    default_content_type: &str,
    token: &CancellationToken,
) -> Result<Vec<String>, ExtractError> {
    let content_type = content_type_for(&result.name, default_content_type);
    let handler = registry
        .lookup(&content_type)
        .ok_or_else(|| ExtractError::NoHandler {
            content_type: content_type.clone(),
        })?;

    // Step 2a re-opens the artifact via the container `Fs` rather than
    // reusing `result.content`, per the extractor's stated retrieval path.
    let bytes = container
        .get(&result.name, token)
        .await
        .map_err(|source| ExtractError::Fetch {
            name: result.name.clone(),
            source,
        })?;
    let candidates = handler.extract(&bytes);

    let mut surviving = Vec::new();
    for candidate in candidates {
        for link in link_processor.process(&candidate) {
            if !dedup.is_dup(&link).await {
                surviving.push(link);
            }
        }
    }
    Ok(surviving)
}

/// Derives a content type from `name`'s extension; extension-less or
/// unrecognized names fall back to `default_content_type`.
fn content_type_for(name: &str, default_content_type: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        "text/html".to_string()
    } else {
        default_content_type.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::extract::{DedupSet, HtmlLinkHandler};
    use crate::fs::MemFs;

    fn registry_with_html() -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        registry.register("text/html", Arc::new(HtmlLinkHandler::new()));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn emits_one_outlink_request_per_successful_result() {
        let fs: Arc<dyn crate::fs::Fs> = Arc::new(MemFs::new());
        let html = br#"<a href="https://next.example/a">x</a>"#.to_vec();
        fs.put("page.html", 0o644, &html, &CancellationToken::new()).await.unwrap();
        let request = Request::new("seed", Arc::clone(&fs), 0).with_names(vec!["page.html".to_string()]);
        let downloaded = Downloaded::new(request, vec![FetchResult::ok("page.html", html, 0)]);

        let pool = ExtractorPool::new(
            ExtractorPoolConfig::new(1, 5),
            registry_with_html(),
            Arc::new(LinkProcessor::passthrough()),
            Arc::new(DedupSet::new()),
        );
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        in_tx.send(downloaded).await.unwrap();
        drop(in_tx);

        pool.run(in_rx, out_tx, None, CancellationToken::new()).await;
        let crawled = out_rx.recv().await.unwrap();
        assert_eq!(crawled.outlinks.len(), 1);
        assert_eq!(crawled.outlinks[0].names, vec!["https://next.example/a"]);
        assert_eq!(crawled.outlinks[0].depth, 1);
    }

    #[tokio::test]
    async fn no_outlinks_emitted_at_max_depth() {
        let fs: Arc<dyn crate::fs::Fs> = Arc::new(MemFs::new());
        let html = br#"<a href="https://next.example/a">x</a>"#.to_vec();
        fs.put("page.html", 0o644, &html, &CancellationToken::new()).await.unwrap();
        let request = Request::new("seed", fs, 3).with_names(vec!["page.html".to_string()]);
        let downloaded = Downloaded::new(request, vec![FetchResult::ok("page.html", html, 0)]);

        let pool = ExtractorPool::new(
            ExtractorPoolConfig::new(1, 3),
            registry_with_html(),
            Arc::new(LinkProcessor::passthrough()),
            Arc::new(DedupSet::new()),
        );
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        in_tx.send(downloaded).await.unwrap();
        drop(in_tx);

        pool.run(in_rx, out_tx, None, CancellationToken::new()).await;
        let crawled = out_rx.recv().await.unwrap();
        assert!(crawled.outlinks.is_empty());
    }

    #[tokio::test]
    async fn duplicate_links_across_results_are_collapsed() {
        let fs: Arc<dyn crate::fs::Fs> = Arc::new(MemFs::new());
        let html = br#"<a href="https://shared.example/x">x</a>"#.to_vec();
        let token = CancellationToken::new();
        fs.put("a.html", 0o644, &html, &token).await.unwrap();
        fs.put("b.html", 0o644, &html, &token).await.unwrap();
        let request =
            Request::new("seed", fs, 0).with_names(vec!["a.html".to_string(), "b.html".to_string()]);
        let downloaded = Downloaded::new(
            request,
            vec![
                FetchResult::ok("a.html", html.clone(), 0),
                FetchResult::ok("b.html", html, 0),
            ],
        );

        let pool = ExtractorPool::new(
            ExtractorPoolConfig::new(1, 5),
            registry_with_html(),
            Arc::new(LinkProcessor::passthrough()),
            Arc::new(DedupSet::new()),
        );
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        in_tx.send(downloaded).await.unwrap();
        drop(in_tx);

        pool.run(in_rx, out_tx, None, CancellationToken::new()).await;
        let crawled = out_rx.recv().await.unwrap();
        let total_names: usize = crawled.outlinks.iter().map(|r| r.names.len()).sum();
        assert_eq!(total_names, 1);
    }

    #[tokio::test]
    async fn missing_handler_reports_extract_error_not_a_panic() {
        let fs: Arc<dyn crate::fs::Fs> = Arc::new(MemFs::new());
        let request = Request::new("seed", fs, 0).with_names(vec!["data.bin".to_string()]);
        let downloaded = Downloaded::new(request, vec![FetchResult::ok("data.bin", vec![1, 2, 3], 0)]);

        let pool = ExtractorPool::new(
            ExtractorPoolConfig::new(1, 5),
            Arc::new(HandlerRegistry::new()),
            Arc::new(LinkProcessor::passthrough()),
            Arc::new(DedupSet::new()),
        );
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let (err_tx, mut err_rx) = mpsc::channel(1);
        in_tx.send(downloaded).await.unwrap();
        drop(in_tx);

        pool.run(in_rx, out_tx, Some(err_tx), CancellationToken::new()).await;
        let crawled = out_rx.recv().await.unwrap();
        assert!(crawled.outlinks.is_empty());
        let errors = err_rx.recv().await.unwrap();
        assert_eq!(errors.failures.len(), 1);
    }
}
