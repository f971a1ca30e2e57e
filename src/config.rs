//! Configuration data shapes for every crawl-engine section (§6).
//!
//! These are plain, `serde`-deserializable structs describing the *values*
//! a crawl run needs — names and meanings match the external-interfaces
//! table, not any particular file format. Parsing a config file (TOML,
//! YAML, ...) into these types, and any CLI surface layered on top, is left
//! to the caller: the engine only consumes the resulting values.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rate::RateControlConfig as RuntimeRateControlConfig;

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_backoff_steps() -> u32 {
    5
}

fn default_sharding_prefix_len() -> usize {
    2
}

/// `crawl` section: traversal shape and the link-processing rule bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub name: String,
    /// Maximum traversal depth; `0` means "just the seeds".
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub seeds: Vec<String>,
    #[serde(default)]
    pub no_follow: Vec<String>,
    #[serde(default)]
    pub follow: Vec<String>,
    #[serde(default)]
    pub rewrite: Vec<String>,
    #[serde(default)]
    pub num_extractors: usize,
    /// Content-type tags the crawl's `HandlerRegistry` should have entries
    /// for; which concrete handler backs each tag is a caller concern.
    #[serde(default)]
    pub extractors: Vec<String>,
}

/// `download` section: downloader-pool concurrency and channel capacities,
/// uniformly or with sparse per-depth overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default)]
    pub default_concurrency: usize,
    #[serde(default = "default_chan_size")]
    pub default_request_chan_size: usize,
    #[serde(default = "default_chan_size")]
    pub default_crawled_chan_size: usize,
    /// `per_depth_*[d] = Some(n)` overrides the default for depth `d`;
    /// `None` (or the vector being shorter than `d`) falls back to the
    /// default.
    #[serde(default)]
    pub per_depth_concurrency: Vec<Option<usize>>,
    #[serde(default)]
    pub per_depth_request_chan_size: Vec<Option<usize>>,
    #[serde(default)]
    pub per_depth_crawled_chan_size: Vec<Option<usize>>,
}

fn default_chan_size() -> usize {
    64
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_concurrency: 0,
            default_request_chan_size: default_chan_size(),
            default_crawled_chan_size: default_chan_size(),
            per_depth_concurrency: Vec::new(),
            per_depth_request_chan_size: Vec::new(),
            per_depth_crawled_chan_size: Vec::new(),
        }
    }
}

impl DownloadConfig {
    /// Resolves the effective concurrency for `depth`, honoring a
    /// per-depth override when present.
    #[must_use]
    pub fn concurrency_for(&self, depth: u32) -> usize {
        self.per_depth_concurrency
            .get(depth as usize)
            .copied()
            .flatten()
            .unwrap_or(self.default_concurrency)
    }

    #[must_use]
    pub fn request_chan_size_for(&self, depth: u32) -> usize {
        self.per_depth_request_chan_size
            .get(depth as usize)
            .copied()
            .flatten()
            .unwrap_or(self.default_request_chan_size)
    }

    #[must_use]
    pub fn crawled_chan_size_for(&self, depth: u32) -> usize {
        self.per_depth_crawled_chan_size
            .get(depth as usize)
            .copied()
            .flatten()
            .unwrap_or(self.default_crawled_chan_size)
    }
}

/// `rate_control.exponential_backoff` sub-section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_initial_delay")]
    pub initial_delay: Duration,
    #[serde(default = "default_backoff_steps")]
    pub steps: u32,
    /// HTTP status codes an `HttpFs`-backed run should treat as retryable,
    /// in addition to its built-in 5xx/429 classification.
    #[serde(default)]
    pub status_codes: Vec<u16>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            steps: default_backoff_steps(),
            status_codes: Vec::new(),
        }
    }
}

/// `rate_control` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateControlConfig {
    #[serde(default = "default_tick")]
    pub tick: Duration,
    #[serde(default)]
    pub requests_per_tick: Option<u64>,
    #[serde(default)]
    pub bytes_per_tick: Option<u64>,
    #[serde(default)]
    pub exponential_backoff: BackoffConfig,
}

impl Default for RateControlConfig {
    fn default() -> Self {
        Self {
            tick: default_tick(),
            requests_per_tick: None,
            bytes_per_tick: None,
            exponential_backoff: BackoffConfig::default(),
        }
    }
}

impl From<&RateControlConfig> for RuntimeRateControlConfig {
    /// Flattens the config-file shape into the runtime controller's shape.
    /// `status_codes` has no runtime counterpart here: it is consulted by
    /// an `HttpFs`-backed run when classifying a response, not by the
    /// generic rate controller.
    fn from(config: &RateControlConfig) -> Self {
        RuntimeRateControlConfig {
            tick: config.tick,
            requests_per_tick: config.requests_per_tick,
            bytes_per_tick: config.bytes_per_tick,
            initial_delay: config.exponential_backoff.initial_delay,
            steps: config.exponential_backoff.steps,
        }
    }
}

/// `cache` section: where downloads and checkpoints live, and how they're
/// sharded/written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub downloads: PathBuf,
    #[serde(default)]
    pub clear_before_crawl: bool,
    pub checkpoint: PathBuf,
    #[serde(default = "default_sharding_prefix_len")]
    pub sharding_prefix_len: usize,
    /// `0` selects a synchronous content store; any other value is the
    /// async store's worker count.
    #[serde(default)]
    pub concurrency: usize,
}
