//! Content-store fan-out placement against real disk I/O (§8 "Fan-out").

use std::sync::Arc;

use sha1::{Digest, Sha1};
use tokio_util::sync::CancellationToken;

use crawl_engine_core::content_store::SyncContentStore;
use crawl_engine_core::fs::{Fs, LocalFs};

fn expected_shard(crawl_name: &str, download_name: &str, shard_chars: usize) -> String {
    let mut hasher = Sha1::new();
    hasher.update(crawl_name.as_bytes());
    hasher.update(download_name.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex[..shard_chars.min(hex.len())].to_string()
}

#[tokio::test]
async fn two_seeds_land_under_their_own_shard_prefix_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fs: Arc<dyn Fs> = Arc::new(LocalFs::new(dir.path()));
    let token = CancellationToken::new();

    let crawl_name = "test";
    let store = SyncContentStore::new(Arc::clone(&fs), "downloads", 1, 0o644);

    for seed in ["rand1", "rand6"] {
        store.write(crawl_name, seed, seed.as_bytes(), &token).await.unwrap();
    }

    for seed in ["rand1", "rand6"] {
        let shard = expected_shard(crawl_name, seed, 1);
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("downloads").join(&shard))
            .unwrap_or_else(|e| panic!("expected shard dir {shard} to exist: {e}"))
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries.len(), 1, "shard {shard} should contain exactly the one artifact for {seed}");
        assert_eq!(
            store.read(crawl_name, seed, &token).await.unwrap(),
            seed.as_bytes(),
            "artifact for {seed} should round-trip through its shard"
        );
    }
}

#[tokio::test]
async fn distinct_crawl_names_never_collide_on_the_same_seed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fs: Arc<dyn Fs> = Arc::new(LocalFs::new(dir.path()));
    let token = CancellationToken::new();
    let store = SyncContentStore::new(Arc::clone(&fs), "downloads", 2, 0o644);

    store.write("crawl-a", "seed", b"from-a", &token).await.unwrap();
    store.write("crawl-b", "seed", b"from-b", &token).await.unwrap();

    assert_eq!(store.read("crawl-a", "seed", &token).await.unwrap(), b"from-a");
    assert_eq!(store.read("crawl-b", "seed", &token).await.unwrap(), b"from-b");
}
