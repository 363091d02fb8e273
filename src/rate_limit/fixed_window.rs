//! Fixed-window admission policy.

use dashmap::DashMap;

use crate::rate_limit::{epoch_secs, RateLimiter};

/// Fixed-window rate limiter.
///
/// Counts requests per client per window index (epoch seconds divided
/// by the window size) and admits while the counter stays below the
/// maximum. Simpler than the token bucket but allows up to 2x the
/// budget across a window boundary.
pub struct FixedWindow {
    window_secs: i64,
    max_requests: i64,
    counters: DashMap<String, i64>,
}

impl FixedWindow {
    pub fn new(window_secs: i64, max_requests: i64) -> Self {
        Self {
            window_secs,
            max_requests,
            counters: DashMap::new(),
        }
    }

    /// Run one admission check at the given wall-clock time.
    pub fn check_at(&self, client_id: &str, now: i64) -> bool {
        let window = now / self.window_secs;
        let key = format!("{client_id}_{window}");

        let mut count = self.counters.entry(key).or_insert(0);
        if *count < self.max_requests {
            *count += 1;
            true
        } else {
            false
        }
    }

    /// Drop counters for windows older than the previous one.
    ///
    /// Each client leaks one counter per window otherwise; the server
    /// runs this periodically from a background task.
    pub fn prune_expired(&self, now: i64) {
        let current_window = now / self.window_secs;
        self.counters.retain(|key, _| {
            key.rsplit('_')
                .next()
                .and_then(|w| w.parse::<i64>().ok())
                .is_some_and(|w| w + 1 >= current_window)
        });
    }

    #[cfg(test)]
    fn tracked_windows(&self) -> usize {
        self.counters.len()
    }
}

impl RateLimiter for FixedWindow {
    fn is_allowed(&self, client_id: &str) -> bool {
        self.check_at(client_id, epoch_secs())
    }

    fn prune(&self, now: i64) {
        self.prune_expired(now);
    }
}
