//! Sharded write of downloaded artifacts, with an optional async queue
//! layered on top of the synchronous path.

mod async_store;
mod error;
mod shard;
mod sync_store;

pub use async_store::{AsyncContentStore, AsyncContentStoreConfig};
pub use error::ContentStoreError;
pub use shard::shard_path;
pub use sync_store::{ContentStoreStats, SyncContentStore};
