//! Per-model request rate limiting.
//!
//! Each unique model name owns one limiter, shared by every agent that
//! references the model. A limiter never rejects a request: callers block
//! cooperatively until the current window has capacity again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::runtime::Shutdown;

static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<RateLimiter>>>> = OnceLock::new();

/// Sliding-window limiter for one model: at most `max_requests` acquisitions
/// per `window`.
pub struct RateLimiter {
    model: String,
    max_requests: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

struct WindowState {
    requests: u32,
    window_start: Instant,
}

impl RateLimiter {
    fn new(model: &str, max_requests: u32, window: Duration) -> Self {
        Self {
            model: model.to_string(),
            max_requests: max_requests.max(1),
            window,
            state: Mutex::new(WindowState {
                requests: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Returns the process-wide limiter for `model`, creating it on first
    /// use. The limits of the first caller win; later callers for the same
    /// model share the existing window.
    pub fn for_model(model: &str, max_requests: u32, window_seconds: u64) -> Arc<RateLimiter> {
        let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        let mut map = registry.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(map.entry(model.to_string()).or_insert_with(|| {
            Arc::new(RateLimiter::new(
                model,
                max_requests,
                Duration::from_secs(window_seconds.max(1)),
            ))
        }))
    }

    /// Blocks until a request slot is available in the current window.
    /// Returns `false` only when shutdown was requested while waiting.
    pub fn acquire(&self, shutdown: &Shutdown) -> bool {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                let now = Instant::now();
                if now.duration_since(state.window_start) >= self.window {
                    state.window_start = now;
                    state.requests = 0;
                }
                if state.requests < self.max_requests {
                    state.requests += 1;
                    return true;
                }
                self.window - now.duration_since(state.window_start)
            };

            warn!(
                model = %self.model,
                "Rate limit reached, delaying request for {:.1}s",
                wait.as_secs_f64()
            );
            crate::runtime::sleep_with_quantum(shutdown, wait, Duration::from_secs(1));
            if shutdown.is_requested() {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_limiter(max: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new("test-model", max, Duration::from_millis(window_ms))
    }

    #[test]
    fn test_acquire_up_to_limit_is_immediate() {
        let limiter = test_limiter(3, 60_000);
        let shutdown = Shutdown::new();
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.acquire(&shutdown));
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_acquire_blocks_until_window_resets() {
        let limiter = test_limiter(2, 200);
        let shutdown = Shutdown::new();
        assert!(limiter.acquire(&shutdown));
        assert!(limiter.acquire(&shutdown));

        let start = Instant::now();
        assert!(limiter.acquire(&shutdown));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_acquire_cancelled_by_shutdown() {
        let limiter = test_limiter(1, 600_000);
        let shutdown = Shutdown::new();
        assert!(limiter.acquire(&shutdown));

        shutdown.request();
        assert!(!limiter.acquire(&shutdown));
    }

    #[test]
    fn test_registry_shares_limiter_per_model() {
        let a = RateLimiter::for_model("shared-model", 10, 60);
        let b = RateLimiter::for_model("shared-model", 99, 1);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
