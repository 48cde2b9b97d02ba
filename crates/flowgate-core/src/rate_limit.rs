//! Sliding-window rate limiting and minimum-interval debounce.
//!
//! One deque of epoch-millisecond timestamps per `(scope, client)` key,
//! guarded by that key's own lock so eviction+test+write stays atomic per
//! call without a single global lock serialising unrelated clients.

use std::{collections::VecDeque, sync::Arc};

use dashmap::DashMap;
use flowgate_error::{FlowgateError, Result};
use parking_lot::Mutex;

struct KeyState {
    hits: VecDeque<i64>,
    last_hit_ms: Option<i64>,
}

impl KeyState {
    const fn new() -> Self {
        Self { hits: VecDeque::new(), last_hit_ms: None }
    }
}

/// Per-key sliding-window rate limiter plus minimum-interval debounce.
#[derive(Clone, Default)]
pub struct RateLimiter {
    keys: Arc<DashMap<(String, String), Arc<Mutex<KeyState>>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self { keys: Arc::new(DashMap::new()) }
    }

    /// Evict hits older than the window, then admit or reject `(scope,
    /// client)` against `max` within `window_secs` and `interval_min_ms`
    /// since the last admitted hit. `now_ms` is the caller-supplied
    /// current time (epoch milliseconds) so tests can drive it directly.
    ///
    /// # Errors
    ///
    /// [`FlowgateError::RateLimit`] if the window is full or the last hit
    /// was more recent than `interval_min_ms`.
    pub fn check(
        &self,
        scope: &str,
        client: &str,
        max: u32,
        window_secs: u64,
        interval_min_ms: u64,
        now_ms: i64,
    ) -> Result<()> {
        let key = (scope.to_string(), client.to_string());
        let state = Arc::clone(self.keys.entry(key).or_insert_with(|| Arc::new(Mutex::new(KeyState::new()))).value());
        let mut state = state.lock();

        let window_ms = i64::try_from(window_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let cutoff = now_ms.saturating_sub(window_ms);
        while state.hits.front().is_some_and(|&t| t < cutoff) {
            state.hits.pop_front();
        }

        if max > 0 && state.hits.len() >= max as usize {
            return Err(FlowgateError::rate_limit("exceeded"));
        }

        if interval_min_ms > 0 {
            if let Some(last) = state.last_hit_ms {
                if now_ms - last < i64::try_from(interval_min_ms).unwrap_or(i64::MAX) {
                    return Err(FlowgateError::rate_limit("interval too small"));
                }
            }
        }

        state.hits.push_back(now_ms);
        state.last_hit_ms = Some(now_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_max_then_rejects() {
        let limiter = RateLimiter::new();
        for i in 0..3 {
            limiter.check("api", "client-a", 3, 60, 0, i * 10).unwrap();
        }
        assert!(limiter.check("api", "client-a", 3, 60, 0, 35).is_err());
    }

    #[test]
    fn window_eviction_admits_after_waiting_out() {
        let limiter = RateLimiter::new();
        for i in 0..2 {
            limiter.check("api", "client-a", 2, 1, 0, i * 10).unwrap();
        }
        assert!(limiter.check("api", "client-a", 2, 1, 0, 20).is_err());
        // past the 1-second window
        limiter.check("api", "client-a", 2, 1, 0, 1_100).unwrap();
    }

    #[test]
    fn interval_min_rejects_rapid_repeats() {
        let limiter = RateLimiter::new();
        limiter.check("api", "client-a", 0, 60, 500, 0).unwrap();
        assert!(limiter.check("api", "client-a", 0, 60, 500, 200).is_err());
        limiter.check("api", "client-a", 0, 60, 500, 600).unwrap();
    }

    #[test]
    fn distinct_clients_do_not_share_state() {
        let limiter = RateLimiter::new();
        limiter.check("api", "client-a", 1, 60, 0, 0).unwrap();
        limiter.check("api", "client-b", 1, 60, 0, 0).unwrap();
        assert!(limiter.check("api", "client-a", 1, 60, 0, 5).is_err());
    }

    #[test]
    fn max_zero_disables_the_window_check() {
        let limiter = RateLimiter::new();
        for i in 0..50 {
            limiter.check("api", "client-a", 0, 60, 0, i).unwrap();
        }
    }
}
