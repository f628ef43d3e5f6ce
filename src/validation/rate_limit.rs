use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Request gate for a link group.
///
/// `acquire` suspends until one request credit is available. Credits are
/// recorded only when an acquisition completes, so a caller cancelled while
/// waiting does not leak one.
#[derive(Debug, Clone)]
pub struct RateLimit {
    window: Option<Arc<Window>>,
}

#[derive(Debug)]
struct Window {
    max_requests: usize,
    interval: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimit {
    /// A rate limit that never blocks.
    pub fn none() -> Self {
        Self { window: None }
    }

    /// Admit at most `max_requests` requests in any rolling window of
    /// `interval`.
    pub fn requests_per_time_interval(max_requests: usize, interval: Duration) -> Self {
        Self {
            window: Some(Arc::new(Window {
                max_requests: max_requests.max(1),
                interval,
                admitted: Mutex::new(VecDeque::new()),
            })),
        }
    }

    /// Wait until one request credit is available, then consume it.
    pub async fn acquire(&self) {
        let Some(window) = &self.window else {
            return;
        };
        loop {
            let wait = {
                let mut admitted = window.admitted.lock().expect("rate limit lock poisoned");
                let now = Instant::now();
                while let Some(oldest) = admitted.front() {
                    if now.duration_since(*oldest) >= window.interval {
                        admitted.pop_front();
                    } else {
                        break;
                    }
                }
                if admitted.len() < window.max_requests {
                    admitted.push_back(now);
                    return;
                }
                let oldest = *admitted.front().expect("window is non-empty when full");
                window.interval - now.duration_since(oldest)
            };
            sleep(wait).await;
        }
    }

    /// True when this limit can ever make a caller wait.
    pub fn is_limiting(&self) -> bool {
        self.window.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_none_never_blocks() {
        let limit = RateLimit::none();
        let start = Instant::now();
        for _ in 0..100 {
            limit.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        assert!(!limit.is_limiting());
    }

    #[tokio::test]
    async fn test_window_bound_is_enforced() {
        let limit = RateLimit::requests_per_time_interval(2, Duration::from_millis(100));
        let start = Instant::now();

        limit.acquire().await;
        limit.acquire().await;
        // Third credit only frees up once the first leaves the window
        limit.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(limit.is_limiting());
    }

    #[tokio::test]
    async fn test_credits_free_up_after_interval() {
        let limit = RateLimit::requests_per_time_interval(1, Duration::from_millis(50));

        limit.acquire().await;
        sleep(Duration::from_millis(60)).await;

        let start = Instant::now();
        limit.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_repeated_acquire_is_safe() {
        let limit = RateLimit::requests_per_time_interval(3, Duration::from_millis(10));
        for _ in 0..9 {
            limit.acquire().await;
        }
    }
}
