//! Sliding-window rate limiter for outbound vision requests.
//!
//! Two rules are enforced on every [`RateLimiter::acquire`]:
//!
//! 1. at least `min_delay` between the starts of consecutive requests;
//! 2. at most `max_requests` requests inside any trailing `window`.
//!
//! The rate budget belongs to the service account, not to a document, so a
//! single limiter is shared by every conversion a [`crate::Converter`] runs.
//! The internal lock is held across the suspension: concurrent callers queue
//! up and are released one at a time.
//!
//! Time comes from `tokio::time`, so tests drive the limiter with a paused
//! clock instead of real sleeps.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

#[derive(Debug, Default)]
struct RateWindow {
    /// Start times of accepted requests younger than `window`, oldest first.
    requests: VecDeque<Instant>,
    last_request: Option<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Blocks callers until one more request fits the configured budget.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<RateWindow>,
    max_requests: usize,
    window: Duration,
    min_delay: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration, min_delay: Duration) -> Self {
        Self {
            state: Mutex::new(RateWindow::default()),
            max_requests: max_requests.max(1),
            window,
            min_delay,
        }
    }

    /// Wait until a request is allowed, then record it.
    ///
    /// Never fails; the only effect besides the delay is the recorded
    /// timestamp.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        if let Some(last) = state.last_request {
            let ready_at = last + self.min_delay;
            if Instant::now() < ready_at {
                debug!(
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "Rate limiter: enforcing minimum delay"
                );
                sleep_until(ready_at).await;
            }
        }

        state.prune(Instant::now(), self.window);

        while state.requests.len() >= self.max_requests {
            let Some(&oldest) = state.requests.front() else {
                break;
            };
            let exits_at = oldest + self.window;
            if Instant::now() < exits_at {
                debug!(
                    in_window = state.requests.len(),
                    wait_ms = (exits_at - Instant::now()).as_millis() as u64,
                    "Rate limiter: window full, waiting for oldest request to expire"
                );
                sleep_until(exits_at).await;
            }
            state.prune(Instant::now(), self.window);
        }

        let now = Instant::now();
        state.requests.push_back(now);
        state.last_request = Some(now);
    }

    /// Requests recorded inside the current window.
    pub async fn in_window(&self) -> usize {
        let mut state = self.state.lock().await;
        state.prune(Instant::now(), self.window);
        state.requests.len()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }
}
