//! Concurrent, rate-controlled, retrying fetch layer.
//!
//! Grounded in the teacher's `download/engine` module: a worker pool pulls
//! requests off a channel, each name is fetched with retry, and progress is
//! reported on an optional side channel. The teacher's per-domain politeness
//! and persistence concerns are replaced by the crate-wide `RateController`
//! and the caller-supplied `Fs`/checkpoint layers respectively.

mod error;
mod pool;
mod progress;

pub use error::DownloaderError;
pub use pool::{DownloaderPool, DownloaderPoolConfig};
pub use progress::ProgressUpdate;
