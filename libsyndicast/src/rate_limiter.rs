//! Pacing between consecutive calls to the same external service
//!
//! The coordinator paces platform runs and the reddit adapter paces
//! subreddit submissions. Both go through [`RateLimiter`] so tests can swap in
//! [`NoDelay`] or [`CountingRateLimiter`] and never sleep on the wall clock.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until the next call is allowed
    async fn wait(&self);

    /// Mark the end of a paced call; the next interval starts here
    async fn done(&self) {}
}

/// Enforces a minimum gap between the end of one call and the start of the next
///
/// The first call never waits.
#[derive(Debug)]
pub struct IntervalRateLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl IntervalRateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RateLimiter for IntervalRateLimiter {
    async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                let remaining = self.interval - elapsed;
                tracing::debug!("Pacing: waiting {:?} before next call", remaining);
                sleep(remaining).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn done(&self) {
        *self.last.lock().await = Some(Instant::now());
    }
}

/// Never waits
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl RateLimiter for NoDelay {
    async fn wait(&self) {}
}

/// Never waits, but counts how often it was asked to
#[derive(Debug, Clone, Default)]
pub struct CountingRateLimiter {
    waits: Arc<AtomicUsize>,
}

impl CountingRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiter for CountingRateLimiter {
    async fn wait(&self) {
        self.waits.fetch_add(1, Ordering::SeqCst);
    }
}
