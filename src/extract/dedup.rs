//! Process-lifetime, lock-protected dedup set for outlink URLs.

use std::collections::HashSet;

use tokio::sync::Mutex;

/// Extension point for "has this link already been emitted" checks.
///
/// The default [`DedupSet`] is an in-memory hash-set; swap in a
/// Bloom-filter-backed or on-disk implementation for very large crawls
/// without touching the extractor pool.
#[async_trait::async_trait]
pub trait IsDup: Send + Sync {
    /// Returns `true` and records `link` as seen if this is its first
    /// occurrence returns `false`; otherwise returns `true` without
    /// recording anything twice.
    async fn is_dup(&self, link: &str) -> bool;
}

/// A lock-protected `HashSet<String>` keyed on the final (post-rewrite) URL
/// string, scoped to one extractor pool instance's lifetime.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: Mutex<HashSet<String>>,
}

impl DedupSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait::async_trait]
impl IsDup for DedupSet {
    async fn is_dup(&self, link: &str) -> bool {
        let mut seen = self.seen.lock().await;
        !seen.insert(link.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_occurrence_is_not_a_duplicate() {
        let set = DedupSet::new();
        assert!(!set.is_dup("https://a.example").await);
        assert!(set.is_dup("https://a.example").await);
    }

    #[tokio::test]
    async fn distinct_links_are_tracked_independently() {
        let set = DedupSet::new();
        assert!(!set.is_dup("a").await);
        assert!(!set.is_dup("b").await);
        assert!(set.is_dup("a").await);
        assert!(set.is_dup("b").await);
    }
}
