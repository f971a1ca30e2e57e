//! Checkpoint numbering and compaction against real disk I/O (§8).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crawl_engine_core::checkpoint::CheckpointStore;
use crawl_engine_core::fs::{Fs, LocalFs};

#[tokio::test]
async fn sequence_numbers_are_zero_padded_and_monotonic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fs: Arc<dyn Fs> = Arc::new(LocalFs::new(dir.path()));
    let token = CancellationToken::new();
    let store = CheckpointStore::new(fs, "checkpoints", 0o755);
    store.init(&token).await.unwrap();

    let id1 = store.checkpoint("-1-of-3", b"0", &token).await.unwrap();
    let id2 = store.checkpoint("-2-of-3", b"1", &token).await.unwrap();

    assert_eq!(id1, "00000000-1-of-3.chk");
    assert_eq!(id2, "00000001-2-of-3.chk");
    assert_eq!(store.latest(&token).await.unwrap(), Some(b"1".to_vec()));
}

#[tokio::test]
async fn compaction_collapses_five_checkpoints_to_one_zeroed_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fs: Arc<dyn Fs> = Arc::new(LocalFs::new(dir.path()));
    let token = CancellationToken::new();
    let store = CheckpointStore::new(fs, "checkpoints", 0o755);
    store.init(&token).await.unwrap();

    for i in 0..5u32 {
        store
            .checkpoint("-label", i.to_string().as_bytes(), &token)
            .await
            .unwrap();
    }

    let compacted_id = store.compact("-label", &token).await.unwrap();
    assert_eq!(compacted_id, "00000000-label.chk");
    assert_eq!(store.latest(&token).await.unwrap(), Some(b"4".to_vec()));

    let remaining: Vec<_> = std::fs::read_dir(dir.path().join("checkpoints"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(remaining, vec!["00000000-label.chk".to_string()]);
}

#[tokio::test]
async fn complete_clears_checkpoints_so_a_fresh_store_starts_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fs: Arc<dyn Fs> = Arc::new(LocalFs::new(dir.path()));
    let token = CancellationToken::new();
    let store = CheckpointStore::new(Arc::clone(&fs), "checkpoints", 0o755);
    store.init(&token).await.unwrap();
    store.checkpoint("-x", b"payload", &token).await.unwrap();

    store.complete(&token).await.unwrap();

    let reopened = CheckpointStore::new(fs, "checkpoints", 0o755);
    reopened.init(&token).await.unwrap();
    assert_eq!(reopened.latest(&token).await.unwrap(), None);
}
