//! SHA-1 prefix sharding for artifact placement.

use sha1::{Digest, Sha1};

/// Splits the SHA-1 hex digest of `crawl_name || download_name` into an
/// intermediate directory (the first `shard_chars` hex characters) and a
/// filename (the remainder).
///
/// `shard_chars` is clamped to the digest's 40 hex characters.
#[must_use]
pub fn shard_path(crawl_name: &str, download_name: &str, shard_chars: usize) -> (String, String) {
    let mut hasher = Sha1::new();
    hasher.update(crawl_name.as_bytes());
    hasher.update(download_name.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }

    let split = shard_chars.min(hex.len());
    let (dir, file) = hex.split_at(split);
    (dir.to_string(), file.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_shard() {
        let a = shard_path("crawl", "page.html", 2);
        let b = shard_path("crawl", "page.html", 2);
        assert_eq!(a, b);
    }

    #[test]
    fn different_downloads_usually_shard_differently() {
        let a = shard_path("crawl", "page-one.html", 2);
        let b = shard_path("crawl", "page-two.html", 2);
        assert_ne!(a, b);
    }

    #[test]
    fn dir_and_file_together_reconstruct_the_full_digest() {
        let (dir, file) = shard_path("crawl", "page.html", 4);
        assert_eq!(dir.len(), 4);
        assert_eq!(dir.len() + file.len(), 40);
    }

    #[test]
    fn shard_chars_is_clamped_to_digest_length() {
        let (dir, file) = shard_path("crawl", "page.html", 1000);
        assert_eq!(dir.len(), 40);
        assert!(file.is_empty());
    }
}
