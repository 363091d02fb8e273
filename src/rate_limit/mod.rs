//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives with a client identifier
//!     → rate limiter policy (token_bucket.rs or fixed_window.rs)
//!     → admit: request proceeds to routing
//!     → deny: dispatcher returns 429, no routing happens
//! ```
//!
//! # Design Decisions
//! - Admission never errors for unknown clients; budget records are
//!   created lazily on first sight
//! - The read-refill-decide-write sequence for one client key is atomic
//!   (DashMap shard entry lock); different clients never contend on
//!   each other's records
//! - Denial is a boolean outcome, not an error value; the 429 mapping
//!   belongs to the dispatcher

pub mod fixed_window;
pub mod token_bucket;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{RateLimitConfig, RateLimitPolicy};

/// A pluggable admission policy.
///
/// Decides admit/deny for a client identifier, mutating that client's
/// budget state as a side effect.
pub trait RateLimiter: Send + Sync {
    fn is_allowed(&self, client_id: &str) -> bool;

    /// Drop budget records that can no longer affect admission. Called
    /// periodically from a background task; the default does nothing.
    fn prune(&self, _now: i64) {}
}

/// Instantiate the limiter named in the configuration.
pub fn limiter_for(config: &RateLimitConfig) -> Arc<dyn RateLimiter> {
    match config.policy {
        RateLimitPolicy::TokenBucket => Arc::new(token_bucket::TokenBucket::new(
            config.max_tokens,
            config.refill_rate,
            config.window_secs,
        )),
        RateLimitPolicy::FixedWindow => Arc::new(fixed_window::FixedWindow::new(
            config.window_secs,
            config.max_tokens,
        )),
    }
}

/// Wall-clock time in whole seconds since the epoch.
pub(crate) fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
