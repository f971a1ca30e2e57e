//! Tick-windowed rate controller with exponential backoff.
//!
//! Pacing is grounded in the teacher's per-domain `RateLimiter` (a tracked
//! "last request" instant guarded by a `tokio::sync::Mutex`, `DashMap` for
//! independent domains); here there is a single shared window rather than
//! one per domain, since the spec's rate window (§4.2) is crawl-global, not
//! per-host. Backoff is grounded in the teacher's `RetryPolicy`
//! (`base * multiplier^attempt`, capped, with jitter) but surfaces a
//! caller-driven decision rather than sleeping internally, so the
//! downloader pool owns the actual `sleep` call and can select on
//! cancellation around it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{BackoffDecision, RateControlError, RateController};

/// Maximum jitter added to a backoff delay.
const MAX_JITTER_MS: u64 = 250;

/// Configuration for a [`TickRateController`].
#[derive(Debug, Clone)]
pub struct RateControlConfig {
    /// Length of one rate window.
    pub tick: Duration,
    /// Maximum requests admitted per tick; `None` disables the request cap.
    pub requests_per_tick: Option<u64>,
    /// Maximum bytes admitted per tick; `None` disables the byte cap.
    pub bytes_per_tick: Option<u64>,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Number of backoff steps before giving up.
    pub steps: u32,
}

impl Default for RateControlConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            requests_per_tick: None,
            bytes_per_tick: None,
            initial_delay: Duration::from_millis(500),
            steps: 5,
        }
    }
}

#[derive(Debug, Default)]
struct Window {
    started_at: Option<Instant>,
    requests: u64,
    bytes: u64,
}

/// A single shared rate window plus exponential backoff parameters.
#[derive(Debug)]
pub struct TickRateController {
    config: RateControlConfig,
    window: Mutex<Window>,
    bytes_this_window: AtomicU64,
}

impl TickRateController {
    #[must_use]
    pub fn new(config: RateControlConfig) -> Self {
        Self {
            config,
            window: Mutex::new(Window::default()),
            bytes_this_window: AtomicU64::new(0),
        }
    }

    /// A controller with no pacing limits and a short backoff, for tests.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(RateControlConfig {
            tick: Duration::from_millis(1),
            requests_per_tick: None,
            bytes_per_tick: None,
            initial_delay: Duration::from_micros(1),
            steps: 10,
        })
    }
}

#[async_trait]
impl RateController for TickRateController {
    #[instrument(skip(self, token))]
    async fn wait(&self, token: &CancellationToken) -> Result<(), RateControlError> {
        loop {
            if token.is_cancelled() {
                return Err(RateControlError::Cancelled);
            }

            let sleep_for = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                let started = *window.started_at.get_or_insert(now);
                if now.duration_since(started) >= self.config.tick {
                    // Roll over to a fresh window.
                    window.started_at = Some(now);
                    window.requests = 0;
                    window.bytes = 0;
                    self.bytes_this_window.store(0, Ordering::SeqCst);
                }

                let over_requests = self
                    .config
                    .requests_per_tick
                    .is_some_and(|limit| window.requests >= limit);
                let over_bytes = self
                    .config
                    .bytes_per_tick
                    .is_some_and(|limit| window.bytes >= limit);

                if over_requests || over_bytes {
                    Some(self.config.tick.saturating_sub(now.duration_since(started)))
                } else {
                    window.requests += 1;
                    None
                }
            };

            match sleep_for {
                None => return Ok(()),
                Some(delay) => {
                    debug!(delay_ms = delay.as_millis(), "rate window exhausted, waiting");
                    tokio::select! {
                        biased;
                        () = token.cancelled() => return Err(RateControlError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn record_bytes(&self, bytes: u64) {
        self.bytes_this_window.fetch_add(bytes, Ordering::SeqCst);
        if let Ok(mut window) = self.window.try_lock() {
            window.bytes += bytes;
        }
    }

    fn backoff(&self, step: u32) -> BackoffDecision {
        if step > self.config.steps {
            return BackoffDecision::GiveUp;
        }
        let base_ms = self.config.initial_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << (step.saturating_sub(1)).min(32));
        let jitter_ms = rand::thread_rng().gen_range(0..=MAX_JITTER_MS);
        BackoffDecision::Retry {
            delay_ms: delay_ms.saturating_add(jitter_ms),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_admits_up_to_the_request_budget_then_blocks() {
        let controller = TickRateController::new(RateControlConfig {
            tick: Duration::from_millis(50),
            requests_per_tick: Some(2),
            bytes_per_tick: None,
            initial_delay: Duration::from_millis(1),
            steps: 3,
        });
        let token = CancellationToken::new();
        let start = Instant::now();
        controller.wait(&token).await.unwrap();
        controller.wait(&token).await.unwrap();
        // Third request must wait for the next window.
        controller.wait(&token).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn backoff_doubles_each_step_until_giving_up() {
        let controller = TickRateController::new(RateControlConfig {
            initial_delay: Duration::from_millis(100),
            steps: 3,
            ..RateControlConfig::default()
        });
        match controller.backoff(1) {
            BackoffDecision::Retry { delay_ms } => assert!(delay_ms >= 100),
            BackoffDecision::GiveUp => panic!("expected retry"),
        }
        match controller.backoff(2) {
            BackoffDecision::Retry { delay_ms } => assert!(delay_ms >= 200),
            BackoffDecision::GiveUp => panic!("expected retry"),
        }
        assert_eq!(controller.backoff(4), BackoffDecision::GiveUp);
    }

    #[tokio::test]
    async fn wait_respects_cancellation() {
        let controller = TickRateController::new(RateControlConfig {
            requests_per_tick: Some(0),
            ..RateControlConfig::default()
        });
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            controller.wait(&token).await,
            Err(RateControlError::Cancelled)
        ));
    }
}
