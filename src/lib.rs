//! Bounded-depth, concurrent web/object crawl engine.
//!
//! The engine chains per-depth [`download`] pools into [`extract`] pools,
//! wired together by the [`crawl`] orchestrator into one breadth-first
//! traversal up to a configured maximum depth. [`checkpoint`] and
//! [`content_store`] persist progress and downloaded artifacts onto an
//! abstract [`fs`] capability set; [`codec`] defines the wire format
//! artifacts are serialized with; [`rate`] paces and retries fetches;
//! [`link`] filters and rewrites discovered outlinks.
//!
//! # Architecture
//!
//! - [`fs`] - the abstract object filesystem contract (`Fs`) plus a
//!   local-disk and an in-memory reference implementation.
//! - [`rate`] - pacing and exponential-backoff gate consulted by the
//!   downloader pool.
//! - [`download`] - concurrent, rate-controlled, retrying fetch pool.
//! - [`link`] - NoFollow/Follow/Rewrite regex pipeline for outlinks.
//! - [`extract`] - per-content-type outlink extraction, dedup, and
//!   next-depth request creation.
//! - [`crawl`] - per-depth pipeline wiring and lifecycle.
//! - [`checkpoint`] - monotonic numbered snapshots on an `Fs` prefix.
//! - [`content_store`] - sharded artifact writes, sync and async.
//! - [`codec`] - the `Object` artifact-serialization wire format.
//! - [`config`] - serde-deserializable configuration data shapes for every
//!   section above; parsing a config *file* is left to the caller.
//! - [`types`] - `Request`/`Downloaded`/`FetchResult`/`Crawled`, the data
//!   flowing between every stage.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod content_store;
pub mod crawl;
pub mod download;
pub mod extract;
pub mod fs;
pub mod link;
pub mod rate;
pub mod types;
mod user_agent;

pub use checkpoint::{CheckpointError, CheckpointStore};
pub use codec::{decode, encode, CodecConfig, CodecError, Encoding, Object, ObjectResponse};
pub use content_store::{AsyncContentStore, AsyncContentStoreConfig, ContentStoreError, SyncContentStore};
pub use crawl::{CrawlError, Crawler, CrawlerConfig, DownloaderFactory, UniformDownloaderFactory};
pub use download::{DownloaderError, DownloaderPool, DownloaderPoolConfig};
pub use extract::{DedupSet, ExtractorPool, ExtractorPoolConfig, HandlerRegistry, HtmlLinkHandler};
pub use fs::{Fs, FsError, HttpFs, LocalFs, MemFs};
pub use link::LinkProcessor;
pub use rate::{RateControlError, RateController, TickRateController};
pub use types::{Crawled, Downloaded, FetchResult, Request};
