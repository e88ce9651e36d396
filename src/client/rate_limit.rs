use std::collections::VecDeque;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Duration, Instant};

/// Width of the rolling request window.
const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window rate limiter for outbound aggregator requests.
///
/// At most `max_per_minute` requests pass per rolling 60-second window.
/// Callers invoke [`wait_if_needed`](Self::wait_if_needed) before every
/// request; when the window is full the call sleeps until the oldest
/// recorded request ages out, then clears the window and proceeds. Aging
/// is strictly FIFO; there is no priority between waiting callers beyond
/// lock acquisition order.
///
/// Built on `tokio::time` so tests can drive it under a paused clock.
pub struct RateLimiter {
    max_per_minute: usize,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: usize) -> Self {
        Self {
            max_per_minute: max_per_minute.max(1),
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Blocks until a request slot is available, then claims it.
    ///
    /// The lock is held across the sleep so waiting callers proceed in
    /// arrival order.
    pub async fn wait_if_needed(&self) {
        let mut window = self.window.lock().await;
        let now = Instant::now();

        // Evict requests that have aged out of the window
        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) >= WINDOW)
        {
            window.pop_front();
        }

        if window.len() >= self.max_per_minute {
            if let Some(oldest) = window.front().copied() {
                let resume_at = oldest + WINDOW;
                tracing::info!(
                    in_window = window.len(),
                    wait_ms = resume_at.saturating_duration_since(now).as_millis() as u64,
                    "Rate limit reached, waiting for window to clear"
                );
                sleep_until(resume_at).await;
            }
            window.clear();
        }

        window.push_back(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_under_limit_passes_immediately() {
        let limiter = RateLimiter::new(3);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait_if_needed().await;
        }
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_window_blocks_until_oldest_ages_out() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();

        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        // Third request must wait the full window behind the first
        limiter.wait_if_needed().await;

        assert!(Instant::now().duration_since(start) >= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aged_entries_are_evicted() {
        let limiter = RateLimiter::new(2);

        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;

        // After the window passes, both slots free up again
        tokio::time::advance(WINDOW).await;
        let start = Instant::now();
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        assert_eq!(Instant::now(), start);
    }
}
