//! Outbound rate limiting for provider adapters.
//!
//! Providers publish three different quota shapes, so there are three
//! policies behind one [`RateLimiter`] contract:
//!
//! | Policy | Shape | On exhaustion |
//! |---|---|---|
//! | [`FixedWindowLimiter`] | N requests per window, counter resets when the window lapses | rejects |
//! | [`SlidingWindowLimiter`] | N requests in any trailing window | rejects |
//! | [`IntervalThrottle`] | at most one request per interval | waits |
//!
//! The rejecting policies let an adapter bail out before spending a round
//! trip. The throttle never rejects: providers such as MusicBrainz require
//! strict pacing instead.
//!
//! All timing uses [`tokio::time::Instant`], so tests can drive the clock
//! with `tokio::time::pause` and `advance`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::context::SearchContext;
use crate::error::{RateLimitExceeded, SourceError};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const HOUR: Duration = Duration::from_secs(60 * 60);

/// Gate consulted before each outbound request.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Admit one request or explain why not.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] when the quota is spent. Throttling
    /// policies wait instead and never return an error.
    async fn allow(&self) -> Result<(), RateLimitExceeded>;
}

/// Limiter state is plain counters; a panic mid-update cannot leave it torn.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[derive(Debug)]
struct WindowCounter {
    count: usize,
    window_start: Instant,
}

/// Counts requests in a fixed window that restarts once it has lapsed.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: usize,
    window: Duration,
    state: Mutex<WindowCounter>,
}

impl FixedWindowLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(WindowCounter {
                count: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// `limit` requests per 24 hours.
    pub fn daily(limit: usize) -> Self {
        Self::new(limit, DAY)
    }

    /// Requests admitted in the current window.
    pub fn count(&self) -> usize {
        lock(&self.state).count
    }

    fn try_acquire(&self) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let mut state = lock(&self.state);

        if now.duration_since(state.window_start) > self.window {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= self.limit {
            return Err(RateLimitExceeded {
                limit: self.limit,
                window: self.window,
            });
        }

        state.count += 1;
        Ok(())
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn allow(&self) -> Result<(), RateLimitExceeded> {
        self.try_acquire()
    }
}

/// Keeps a log of request times and admits at most `limit` per trailing window.
///
/// Pruning is linear in the number of outstanding entries, which is bounded
/// by `limit`.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    requests: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            requests: Mutex::new(VecDeque::new()),
        }
    }

    pub fn hourly(limit: usize) -> Self {
        Self::new(limit, HOUR)
    }

    pub fn daily(limit: usize) -> Self {
        Self::new(limit, DAY)
    }

    /// Requests currently inside the window.
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        let mut requests = lock(&self.requests);
        Self::prune(&mut requests, now, self.window);
        requests.len()
    }

    fn prune(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while requests
            .front()
            .is_some_and(|t| now.duration_since(*t) >= window)
        {
            requests.pop_front();
        }
    }

    fn try_acquire(&self) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let mut requests = lock(&self.requests);
        Self::prune(&mut requests, now, self.window);

        if requests.len() >= self.limit {
            return Err(RateLimitExceeded {
                limit: self.limit,
                window: self.window,
            });
        }

        requests.push_back(now);
        Ok(())
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn allow(&self) -> Result<(), RateLimitExceeded> {
        self.try_acquire()
    }
}

/// Enforces a minimum interval between consecutive requests by waiting.
///
/// The last-request timestamp sits behind an async mutex that is held while
/// waiting, so concurrent callers sharing one throttle are serialised and
/// each is spaced `interval` after the previous one.
#[derive(Debug)]
pub struct IntervalThrottle {
    interval: Duration,
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl IntervalThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: tokio::sync::Mutex::new(None),
        }
    }

    /// One request per second.
    pub fn per_second() -> Self {
        Self::new(Duration::from_secs(1))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next slot.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let next = previous + self.interval;
            if next > Instant::now() {
                tokio::time::sleep_until(next).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Wait for the next slot unless `ctx` is cancelled or expires first.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Cancelled`] or [`SourceError::Timeout`]; the
    /// slot is not consumed in that case.
    pub async fn wait_with(&self, ctx: &SearchContext) -> Result<(), SourceError> {
        ctx.run(async {
            self.wait().await;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RateLimiter for IntervalThrottle {
    async fn allow(&self) -> Result<(), RateLimitExceeded> {
        self.wait().await;
        Ok(())
    }
}
