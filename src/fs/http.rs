//! Read-only HTTP(S)-backed [`Fs`] implementation.
//!
//! The FS contract is "abstract"; the crawl engine is a *web* crawler in
//! practice, so one concrete backend treats each name as a full URL and
//! fetches it with a pooled `reqwest::Client`. Grounded in the teacher's
//! `HttpClient` (streaming downloads, connect/read timeouts, browser
//! fallback `User-Agent`), adapted from a file-writing client into one that
//! returns bytes through the `Fs` contract instead.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::{DirEntry, FileInfo, Fs, FsError, LevelScanner};
use crate::user_agent::default_crawl_user_agent;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Fetches each `open`/`get` path as a URL over HTTP(S).
///
/// Mutating operations (`put`, `ensure_prefix`, `delete`, `delete_all`) are
/// not meaningful against a remote origin and return
/// `FsError::Other`/"unsupported" rather than silently no-op'ing.
#[derive(Debug, Clone)]
pub struct HttpFs {
    client: Client,
    /// Status codes treated as retryable in addition to the built-in
    /// 5xx/429 classification, sourced from
    /// `rate_control.exponential_backoff.status_codes` (§6).
    extra_retryable_statuses: std::collections::HashSet<u16>,
}

impl Default for HttpFs {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFs {
    /// Builds a client with the crawler's default `User-Agent` and
    /// timeouts.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .user_agent(default_crawl_user_agent())
            .gzip(true)
            .build()
            .expect("static HTTP client configuration is always valid");
        Self {
            client,
            extra_retryable_statuses: std::collections::HashSet::new(),
        }
    }

    /// Additionally treats `codes` as retryable, on top of the built-in
    /// 5xx/429 classification.
    #[must_use]
    pub fn with_retryable_statuses(mut self, codes: &[u16]) -> Self {
        self.extra_retryable_statuses.extend(codes.iter().copied());
        self
    }

    fn classify_status(&self, url: &str, status: StatusCode) -> FsError {
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            FsError::NotExist {
                path: url.to_string(),
            }
        } else if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            FsError::Permission {
                path: url.to_string(),
            }
        } else if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || self.extra_retryable_statuses.contains(&status.as_u16())
        {
            FsError::Retryable {
                path: url.to_string(),
                source: Box::new(std::io::Error::other(format!("HTTP {status}"))),
            }
        } else {
            FsError::Other {
                path: url.to_string(),
                source: Box::new(std::io::Error::other(format!("HTTP {status}"))),
            }
        }
    }

    fn unsupported(op: &str, path: &str) -> FsError {
        FsError::Other {
            path: path.to_string(),
            source: Box::new(std::io::Error::other(format!(
                "HttpFs does not support {op}"
            ))),
        }
    }
}

#[async_trait]
impl Fs for HttpFs {
    #[instrument(skip(self, token), fields(url = path))]
    async fn open(&self, path: &str, token: &CancellationToken) -> Result<(Vec<u8>, FileInfo), FsError> {
        if token.is_cancelled() {
            return Err(FsError::Cancelled {
                path: path.to_string(),
            });
        }
        let request = self.client.get(path).send();
        let response = tokio::select! {
            biased;
            () = token.cancelled() => {
                return Err(FsError::Cancelled { path: path.to_string() });
            }
            result = request => result.map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    FsError::Retryable { path: path.to_string(), source: Box::new(e) }
                } else {
                    FsError::Other { path: path.to_string(), source: Box::new(e) }
                }
            })?,
        };

        if !response.status().is_success() {
            let err = self.classify_status(path, response.status());
            warn!(url = path, status = %response.status(), "non-success response");
            return Err(err);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FsError::Retryable {
                path: path.to_string(),
                source: Box::new(e),
            })?;
        debug!(url = path, len = bytes.len(), "fetched");
        let info = FileInfo {
            size: bytes.len() as u64,
            modtime: None,
            is_dir: false,
        };
        Ok((bytes.to_vec(), info))
    }

    async fn put(&self, path: &str, _mode: u32, _data: &[u8], _token: &CancellationToken) -> Result<(), FsError> {
        Err(Self::unsupported("put", path))
    }

    async fn ensure_prefix(&self, prefix: &str, _mode: u32, _token: &CancellationToken) -> Result<(), FsError> {
        Err(Self::unsupported("ensure_prefix", prefix))
    }

    async fn delete(&self, path: &str, _token: &CancellationToken) -> Result<(), FsError> {
        Err(Self::unsupported("delete", path))
    }

    async fn delete_all(&self, prefix: &str, _token: &CancellationToken) -> Result<(), FsError> {
        Err(Self::unsupported("delete_all", prefix))
    }

    async fn stat(&self, path: &str, token: &CancellationToken) -> Result<FileInfo, FsError> {
        self.open(path, token).await.map(|(_, info)| info)
    }

    fn level_scanner(&self, prefix: &str, _batch_size: usize) -> Box<dyn LevelScanner> {
        Box::new(EmptyScanner { _prefix: prefix.to_string() })
    }
}

struct EmptyScanner {
    _prefix: String,
}

#[async_trait]
impl LevelScanner for EmptyScanner {
    async fn next_batch(&mut self) -> Result<Vec<DirEntry>, FsError> {
        Ok(Vec::new())
    }
}
