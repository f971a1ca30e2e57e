//! Core data types shared across the crawl pipeline.
//!
//! A [`Request`] names a batch of objects to fetch from one container. A
//! [`Downloaded`] pairs a `Request` with the per-name [`FetchResult`]s the
//! downloader produced. A [`Crawled`] adds the outlink `Request`s an
//! extractor derived from a `Downloaded`.

use std::sync::Arc;

use crate::fs::Fs;

/// A batch of names to fetch from one container, tagged with crawl depth.
///
/// Immutable once placed on a channel: clone the `Arc<dyn Fs>` rather than
/// mutating fields in place.
#[derive(Clone)]
pub struct Request {
    /// Identity of whatever produced this request (a URL, a seed label, ...).
    pub requested_by: String,
    /// The filesystem/object-store the names in `names` live under.
    pub container: Arc<dyn Fs>,
    /// File mode used for any writes performed on behalf of this request.
    pub mode: u32,
    /// Names to fetch from `container`.
    pub names: Vec<String>,
    /// Distance from the seed set; 0 for seeds.
    pub depth: u32,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("requested_by", &self.requested_by)
            .field("mode", &self.mode)
            .field("names", &self.names)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl Request {
    #[must_use]
    pub fn new(requested_by: impl Into<String>, container: Arc<dyn Fs>, depth: u32) -> Self {
        Self {
            requested_by: requested_by.into(),
            container,
            mode: 0o644,
            names: Vec::new(),
            depth,
        }
    }

    #[must_use]
    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// Outcome of fetching one name from a `Request`'s container.
///
/// One-to-one with the names in the owning `Request`; order is preserved.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The name this result corresponds to.
    pub name: String,
    /// Downloaded bytes; `None` when `err` is set.
    pub content: Option<Vec<u8>>,
    /// Size of `content` as reported by the filesystem, when known.
    pub size: Option<u64>,
    /// Total retry attempts made for this name (0 if it succeeded first try).
    pub retries: u32,
    /// Terminal error, if every attempt failed.
    pub err: Option<Arc<crate::fs::FsError>>,
}

impl FetchResult {
    #[must_use]
    pub fn ok(name: impl Into<String>, content: Vec<u8>, retries: u32) -> Self {
        let size = content.len() as u64;
        Self {
            name: name.into(),
            content: Some(content),
            size: Some(size),
            retries,
            err: None,
        }
    }

    #[must_use]
    pub fn failed(name: impl Into<String>, retries: u32, err: crate::fs::FsError) -> Self {
        Self {
            name: name.into(),
            content: None,
            size: None,
            retries,
            err: Some(Arc::new(err)),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

/// A `Request` paired with the `FetchResult` for each of its names.
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub request: Request,
    pub results: Vec<FetchResult>,
}

impl Downloaded {
    #[must_use]
    pub fn new(request: Request, results: Vec<FetchResult>) -> Self {
        debug_assert_eq!(request.names.len(), results.len());
        Self { request, results }
    }
}

/// A `Downloaded` plus the outlink `Request`s extracted from it.
#[derive(Debug, Clone)]
pub struct Crawled {
    pub downloaded: Downloaded,
    pub outlinks: Vec<Request>,
    pub depth: u32,
}
