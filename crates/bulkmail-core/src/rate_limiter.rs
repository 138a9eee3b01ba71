//! Minimum spacing between sends from one account.
//!
//! The check of the last grant, the wait and the update of the timestamp all
//! happen while holding one async lock, so concurrent workers are released one
//! at a time and never closer together than the configured interval. The lock
//! is released before the caller starts talking to the server.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::debug;

/// Serializes send starts of one account.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Default spacing between sends.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    /// Largest spacing a dispatch run accepts.
    pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Create a limiter. A zero interval disables spacing.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_grant: Mutex::const_new(None),
        }
    }

    /// Configured spacing.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until a send may start and records the grant.
    ///
    /// The first call is granted immediately. Waiters are served in the order
    /// they arrived.
    pub async fn acquire(&self) -> Instant {
        let mut last_grant = self.last_grant.lock().await;

        if let Some(previous) = *last_grant {
            match previous.checked_add(self.min_interval) {
                Some(ready_at) if ready_at > Instant::now() => {
                    debug!(
                        wait_ms = ready_at.saturating_duration_since(Instant::now()).as_millis(),
                        "rate limit: waiting"
                    );
                    sleep_until(ready_at).await;
                }
                Some(_) => {}
                // Past the clock's range; tokio clamps the sleep instead.
                None => sleep(self.min_interval).await,
            }
        }

        let granted = Instant::now();
        *last_grant = Some(granted);
        granted
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tokio::task::JoinSet;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_grant_is_immediate() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        let granted = limiter.acquire().await;
        assert_eq!(granted, start);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_grants_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        let start = Instant::now();
        let a = limiter.acquire().await;
        let b = limiter.acquire().await;
        let c = limiter.acquire().await;
        assert!(b - a >= Duration::from_secs(2));
        assert!(c - b >= Duration::from_secs(2));
        assert!(c - start < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_after_idle_period() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        let before = Instant::now();
        assert_eq!(limiter.acquire().await, before);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_are_serialized() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(2)));
        let mut tasks = JoinSet::new();
        for _ in 0..5 {
            let limiter = Arc::clone(&limiter);
            tasks.spawn(async move { limiter.acquire().await });
        }

        let mut grants = Vec::new();
        while let Some(granted) = tasks.join_next().await {
            grants.push(granted.unwrap());
        }
        grants.sort();
        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn huge_interval_waits_instead_of_overflowing() {
        let limiter = RateLimiter::new(Duration::MAX);
        limiter.acquire().await;
        let second = tokio::time::timeout(Duration::from_secs(3600), limiter.acquire()).await;
        assert!(second.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_never_waits() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert_eq!(Instant::now(), start);
    }
}
