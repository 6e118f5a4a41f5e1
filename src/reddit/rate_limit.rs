// Rate limiting for Reddit API calls.
//
// Reddit tolerates modest request rates from script apps, but a moderation
// bot that polls on a fixed interval is trivially fingerprintable. This
// limiter enforces two constraints on every outbound call:
//
//   1. a randomized minimum spacing, drawn uniformly from
//      [min_delay, max_delay] per call, so consecutive requests never
//      land on a fixed cadence
//   2. a sliding 60-second window capped at a configured request count,
//      as a hard ceiling underneath the jitter
//
// The per-call jitter is the primary defense; the per-minute cap only
// matters if the jitter bounds are configured aggressively low.
//
// A single worker drives the poll loop, but the limiter uses interior
// mutability (Mutex) so the orchestrator can hold it behind &self.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::info;

/// Dual-constraint rate limiter for outbound Reddit calls.
pub struct RateLimiter {
    /// Timestamps of recent requests within the current window.
    requests: Mutex<VecDeque<Instant>>,
    /// Maximum number of requests allowed per window.
    max_per_window: u32,
    /// Duration of the sliding window.
    window: Duration,
    /// Lower bound of the per-call random spacing.
    min_delay: Duration,
    /// Upper bound of the per-call random spacing.
    max_delay: Duration,
    /// Timestamp of the last request (for enforcing the random spacing).
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// - `max_per_minute`: hard ceiling on requests in any 60s window
    /// - `min_delay` / `max_delay`: bounds of the uniform random spacing
    ///   drawn for each call
    pub fn new(max_per_minute: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            requests: Mutex::new(VecDeque::new()),
            max_per_window: max_per_minute,
            window: Duration::from_secs(60),
            min_delay,
            max_delay: max_delay.max(min_delay),
            last_request: Mutex::new(None),
        }
    }

    /// Block until it is safe to issue the next outbound call.
    ///
    /// Enforces the randomized spacing first, then the sliding window.
    /// The call is recorded only after both gates pass.
    pub async fn wait_if_needed(&self) {
        // Draw this call's random spacing. A fresh draw per call is what
        // keeps the observable request pattern aperiodic.
        let spacing = {
            let mut rng = rand::rng();
            Duration::from_secs_f64(
                rng.random_range(self.min_delay.as_secs_f64()..=self.max_delay.as_secs_f64()),
            )
        };

        // Compute the wait while holding the lock, then drop it before
        // sleeping (a MutexGuard must not be held across an await).
        let spacing_wait = {
            let last = self.last_request.lock().unwrap();
            match *last {
                Some(last_time) => {
                    let elapsed = last_time.elapsed();
                    (elapsed < spacing).then(|| spacing - elapsed)
                }
                None => None,
            }
        };

        if let Some(wait) = spacing_wait {
            info!(
                delay_ms = wait.as_millis() as u64,
                "Rate limiting: waiting {:.1}s (random spacing {:.1}s)",
                wait.as_secs_f64(),
                spacing.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
        }

        // Then, the sliding window.
        loop {
            let action = {
                let now = Instant::now();
                let mut requests = self.requests.lock().unwrap();

                // Evict requests that have fallen outside the window
                while let Some(&oldest) = requests.front() {
                    if now.duration_since(oldest) > self.window {
                        requests.pop_front();
                    } else {
                        break;
                    }
                }

                if (requests.len() as u32) < self.max_per_window {
                    // Room in the window — record the call and proceed
                    requests.push_back(now);
                    let mut last = self.last_request.lock().unwrap();
                    *last = Some(now);
                    None
                } else {
                    // Window full — wait until the oldest entry ages out
                    let oldest = *requests.front().unwrap();
                    let wait = (oldest + self.window).duration_since(now);
                    Some(wait)
                }
            }; // Lock is dropped here

            match action {
                None => return,
                Some(wait) => {
                    info!(
                        delay_ms = wait.as_millis() as u64,
                        "Rate limiting: waiting {:.1}s (per-minute limit)",
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(
        max_per_window: u32,
        window: Duration,
        min_delay: Duration,
        max_delay: Duration,
    ) -> RateLimiter {
        RateLimiter {
            requests: Mutex::new(VecDeque::new()),
            max_per_window,
            window,
            min_delay,
            max_delay,
            last_request: Mutex::new(None),
        }
    }

    #[test]
    fn new_creates_empty_limiter() {
        let limiter = RateLimiter::new(4, Duration::from_secs(7), Duration::from_secs(12));
        assert_eq!(limiter.max_per_window, 4);
        assert_eq!(limiter.window, Duration::from_secs(60));
        assert!(limiter.requests.lock().unwrap().is_empty());
        assert!(limiter.last_request.lock().unwrap().is_none());
    }

    #[test]
    fn new_clamps_inverted_bounds() {
        let limiter = RateLimiter::new(4, Duration::from_secs(10), Duration::from_secs(2));
        assert_eq!(limiter.max_delay, limiter.min_delay);
    }

    #[tokio::test]
    async fn first_call_is_immediate() {
        let limiter = RateLimiter::new(100, Duration::from_millis(80), Duration::from_millis(120));

        // Spacing only applies between consecutive calls
        let start = Instant::now();
        limiter.wait_if_needed().await;
        let elapsed = start.elapsed();

        assert!(
            elapsed < Duration::from_millis(50),
            "First call should be near-instant, got {:?}",
            elapsed
        );
        assert!(limiter.last_request.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn consecutive_calls_respect_min_spacing() {
        let limiter = limiter(
            1000,
            Duration::from_secs(60),
            Duration::from_millis(50),
            Duration::from_millis(80),
        );

        let start = Instant::now();
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(45),
            "Expected at least ~50ms between calls, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn spacing_accumulates_over_multiple_calls() {
        let limiter = limiter(
            1000,
            Duration::from_secs(60),
            Duration::from_millis(20),
            Duration::from_millis(30),
        );

        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait_if_needed().await;
        }
        let elapsed = start.elapsed();

        // 4 inter-call gaps of at least ~20ms each
        assert!(
            elapsed >= Duration::from_millis(70),
            "Expected at least ~80ms for 5 calls with 20ms spacing, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn zero_spacing_allows_rapid_fire() {
        let limiter = limiter(100, Duration::from_secs(60), Duration::ZERO, Duration::ZERO);

        let start = Instant::now();
        for _ in 0..50 {
            limiter.wait_if_needed().await;
        }
        let elapsed = start.elapsed();

        assert!(
            elapsed < Duration::from_millis(50),
            "Zero-spacing calls should be near-instant, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn blocks_when_window_full() {
        // 3 calls per 100ms window, no spacing
        let limiter = limiter(
            3,
            Duration::from_millis(100),
            Duration::ZERO,
            Duration::ZERO,
        );

        let start = Instant::now();
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;

        // 4th call blocks until the 100ms window expires
        limiter.wait_if_needed().await;
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(90),
            "Expected at least ~100ms wait for window expiry, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn window_evicts_old_requests() {
        let limiter = limiter(
            2,
            Duration::from_millis(100),
            Duration::ZERO,
            Duration::ZERO,
        );

        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;

        // Wait for the window to expire
        tokio::time::sleep(Duration::from_millis(150)).await;

        let start = Instant::now();
        limiter.wait_if_needed().await;
        let elapsed = start.elapsed();

        assert!(
            elapsed < Duration::from_millis(50),
            "Should not block after window expires, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn records_call_only_after_gates_pass() {
        let limiter = limiter(
            10,
            Duration::from_secs(60),
            Duration::ZERO,
            Duration::ZERO,
        );

        for _ in 0..3 {
            limiter.wait_if_needed().await;
        }
        assert_eq!(limiter.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn spacing_and_window_interact() {
        // Both constraints active: 2 calls per 100ms window, 30ms spacing
        let limiter = limiter(
            2,
            Duration::from_millis(100),
            Duration::from_millis(30),
            Duration::from_millis(30),
        );

        let start = Instant::now();
        limiter.wait_if_needed().await; // instant
        limiter.wait_if_needed().await; // waits ~30ms (spacing)
        limiter.wait_if_needed().await; // window full, waits for expiry
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(90),
            "Expected at least ~100ms total, got {:?}",
            elapsed
        );
    }
}
