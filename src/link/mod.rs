//! Regex-based follow/no-follow/rewrite pipeline for discovered links.

mod processor;

pub use processor::{LinkProcessor, RewriteRule};
