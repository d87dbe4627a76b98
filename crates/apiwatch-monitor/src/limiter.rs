//! Global token-bucket rate limiter for probe execution starts.
//!
//! Tokens accrue continuously at `rate` per second up to a capacity of
//! one second's worth (`rate` tokens). The bucket starts empty, so the
//! first start happens one interval after the run begins.
//!
//! A saved-up bucket alone would let `2 * rate - 1` starts land inside one
//! second after a quiet spell. The limiter also remembers the last `rate`
//! start instants and never allows a start until the oldest of them is at
//! least a second old.

use std::collections::VecDeque;

use tokio::sync::{Mutex, watch};
use tokio::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    /// Most recent start instants, oldest first, at most `per_second` long.
    recent: VecDeque<Instant>,
}

const WINDOW: Duration = Duration::from_secs(1);

/// Bounds how fast new executions may begin, independent of worker count.
#[derive(Debug)]
pub struct RateLimiter {
    per_second: u32,
    capacity: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter allowing `per_second` starts per second.
    ///
    /// A rate of zero is treated as one.
    pub fn new(per_second: u32) -> Self {
        let per_second = per_second.max(1);
        Self {
            per_second,
            capacity: per_second as f64,
            bucket: Mutex::new(Bucket {
                tokens: 0.0,
                last_refill: Instant::now(),
                recent: VecDeque::with_capacity(per_second as usize),
            }),
        }
    }

    pub fn per_second(&self) -> u32 {
        self.per_second
    }

    /// Take a token if one is available, otherwise report how long until one is.
    async fn try_take(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        let accrued = now.duration_since(bucket.last_refill).as_secs_f64() * self.per_second as f64;
        bucket.tokens = (bucket.tokens + accrued).min(self.capacity);
        bucket.last_refill = now;

        if bucket.recent.len() >= self.per_second as usize {
            if let Some(&oldest) = bucket.recent.front() {
                let age = now.duration_since(oldest);
                if age < WINDOW {
                    return Err(WINDOW - age);
                }
            }
        }

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            bucket.recent.push_back(now);
            while bucket.recent.len() > self.per_second as usize {
                bucket.recent.pop_front();
            }
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(missing / self.per_second as f64))
        }
    }

    /// Wait for a token. Returns `false` without taking one if `stop`
    /// is (or becomes) set first.
    pub async fn acquire(&self, stop: &mut watch::Receiver<bool>) -> bool {
        loop {
            if *stop.borrow() {
                return false;
            }
            let wait = match self.try_take().await {
                Ok(()) => return true,
                Err(wait) => wait,
            };
            trace!(wait_ms = wait.as_millis() as u64, "waiting for rate limiter token");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stop.wait_for(|stopped| *stopped) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_token_arrives_after_one_interval() {
        let limiter = RateLimiter::new(2);
        let (_tx, mut rx) = watch::channel(false);
        let start = Instant::now();

        assert!(limiter.acquire(&mut rx).await);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(500), "waited {waited:?}");
        assert!(waited < Duration::from_millis(510), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_rate_matches_configuration() {
        let limiter = RateLimiter::new(4);
        let (_tx, mut rx) = watch::channel(false);
        let start = Instant::now();

        for _ in 0..8 {
            assert!(limiter.acquire(&mut rx).await);
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(2050), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_capped_at_one_second_of_tokens() {
        let limiter = RateLimiter::new(3);
        let (_tx, mut rx) = watch::channel(false);

        // Idle long enough to accrue far more than capacity.
        tokio::time::sleep(Duration::from_secs(10)).await;

        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.acquire(&mut rx).await);
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        // A token is back after 333ms, but three starts already sit in
        // the current second.
        assert!(limiter.acquire(&mut rx).await);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(1), "waited {waited:?}");
        assert!(waited < Duration::from_millis(1010), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn saved_tokens_never_exceed_rate_in_a_rolling_second() {
        let limiter = RateLimiter::new(2);
        let (_tx, mut rx) = watch::channel(false);

        // Two starts at 0.5s and 1.0s, then a quiet spell refills the bucket.
        assert!(limiter.acquire(&mut rx).await);
        assert!(limiter.acquire(&mut rx).await);
        tokio::time::sleep(Duration::from_secs(5)).await;

        let mut starts = Vec::new();
        for _ in 0..5 {
            assert!(limiter.acquire(&mut rx).await);
            starts.push(Instant::now());
        }
        for pair in starts.windows(3) {
            assert!(
                pair[2].duration_since(pair[0]) >= Duration::from_secs(1),
                "three starts within {:?}",
                pair[2].duration_since(pair[0])
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_acquire_returns_immediately() {
        let limiter = RateLimiter::new(1);
        let (tx, mut rx) = watch::channel(false);
        tx.send_replace(true);

        let start = Instant::now();
        assert!(!limiter.acquire(&mut rx).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_unblocks_waiting_acquire() {
        let limiter = RateLimiter::new(1);
        let (tx, mut rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            tx.send_replace(true);
            // Keep the sender alive past the wakeup.
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let start = Instant::now();
        assert!(!limiter.acquire(&mut rx).await);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(200));
        assert!(waited < Duration::from_millis(1000));
    }

    #[test]
    fn zero_rate_is_clamped() {
        assert_eq!(RateLimiter::new(0).per_second(), 1);
    }
}
