use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum spacing between outbound requests across every caller
/// sharing the limiter.
///
/// Unlike a token bucket there is no burst: two consecutive `wait()` calls
/// always return at least `min_interval` apart, no matter which task issued
/// them.
pub struct RateLimiter {
    min_interval: Duration,
    next_at: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_at: Mutex::new(None),
        }
    }

    /// A limiter whose `wait()` returns immediately.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspends until the next request may start.
    ///
    /// The lock is held across the sleep so callers are released one at a
    /// time, in the order they acquired the lock. Dropping the future while it
    /// sleeps leaves the cursor untouched.
    pub async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut next_at = self.next_at.lock().await;
        if let Some(at) = *next_at {
            if Instant::now() < at {
                tokio::time::sleep_until(at).await;
            }
        }

        let now = Instant::now();
        let start = match *next_at {
            Some(at) => now.max(at),
            None => now,
        };
        *next_at = Some(start + self.min_interval);
    }
}
