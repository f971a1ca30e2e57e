//! Pacing and retry-backoff gate for the downloader pool.
//!
//! Combines two concerns the teacher kept separate (a per-domain rate
//! limiter and a standalone retry policy) into one abstraction with two
//! methods, per §9's design note: `wait` is the pacing gate consulted
//! before every attempt, `backoff` computes (and decides whether to take)
//! the exponential delay after a retryable error.

mod controller;

pub use controller::{RateControlConfig, TickRateController};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Whether a failed attempt should be retried, and after how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Retry after sleeping for this many milliseconds.
    Retry { delay_ms: u64 },
    /// Give up; `step` reached the configured maximum.
    GiveUp,
}

/// Pacing + exponential backoff gate.
///
/// `wait` blocks the caller until it is permitted to make one more
/// request against the tracked rate window (requests and/or bytes per
/// tick). `backoff` is consulted after a retryable error to decide whether
/// and how long to sleep before the next attempt.
#[async_trait]
pub trait RateController: Send + Sync {
    /// Blocks until a new request may be issued, honoring `token`.
    async fn wait(&self, token: &CancellationToken) -> Result<(), RateControlError>;

    /// Accounts for `bytes` having been transferred by the request that
    /// `wait` most recently admitted. A no-op for controllers with no byte
    /// budget.
    fn record_bytes(&self, bytes: u64);

    /// Decides whether `step` (the retry attempt number that just failed,
    /// 1-indexed) should be retried, and if so, after how long.
    fn backoff(&self, step: u32) -> BackoffDecision;
}

/// Errors a `RateController` can surface.
#[derive(Debug, thiserror::Error)]
pub enum RateControlError {
    #[error("rate control wait was cancelled")]
    Cancelled,
}
