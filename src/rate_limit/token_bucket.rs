//! Token-bucket admission policy.

use dashmap::DashMap;

use crate::rate_limit::{epoch_secs, RateLimiter};

/// Per-client budget record.
///
/// `last_refill` advances to "now" whenever any tokens are added, even
/// though the added amount is floored from the elapsed time. The
/// fractional remainder is deliberately discarded; rapid successive
/// calls slightly under-credit refill. Do not "fix" this without
/// changing the documented admission behavior.
#[derive(Debug, Clone, Copy)]
struct BudgetRecord {
    tokens: i64,
    last_refill: i64,
}

/// Token-bucket rate limiter.
///
/// Each client owns a capped pool of `max_tokens`; a request consumes
/// one token and `refill_rate` tokens flow back per `window_secs`
/// window. Records are keyed `token_bucket:<clientId>`; the DashMap
/// entry lock makes the whole read-refill-decide-write step atomic per
/// client, so two concurrent checks can never both spend the same
/// token.
pub struct TokenBucket {
    max_tokens: i64,
    refill_rate: i64,
    window_secs: i64,
    buckets: DashMap<String, BudgetRecord>,
}

impl TokenBucket {
    pub fn new(max_tokens: i64, refill_rate: i64, window_secs: i64) -> Self {
        Self {
            max_tokens,
            refill_rate,
            window_secs,
            buckets: DashMap::new(),
        }
    }

    /// Run one admission check at the given wall-clock time.
    ///
    /// Exposed separately from [`RateLimiter::is_allowed`] so tests can
    /// drive the clock.
    pub fn check_at(&self, client_id: &str, now: i64) -> bool {
        let key = format!("token_bucket:{client_id}");
        let mut record = self.buckets.entry(key).or_insert(BudgetRecord {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = (now - record.last_refill).max(0);
        let tokens_to_add = elapsed * self.refill_rate / self.window_secs;
        if tokens_to_add > 0 {
            record.tokens = (record.tokens + tokens_to_add).min(self.max_tokens);
            record.last_refill = now;
        }

        if record.tokens > 0 {
            record.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Remaining tokens for a client, if it has a record.
    pub fn remaining(&self, client_id: &str) -> Option<i64> {
        self.buckets
            .get(&format!("token_bucket:{client_id}"))
            .map(|r| r.tokens)
    }
}

/// Records idle longer than this are dropped by `prune`. A cleanup
/// hint, not a correctness requirement: a recreated record starts with
/// a full budget anyway.
const IDLE_EXPIRY_SECS: i64 = 86_400;

impl RateLimiter for TokenBucket {
    fn is_allowed(&self, client_id: &str) -> bool {
        self.check_at(client_id, epoch_secs())
    }

    fn prune(&self, now: i64) {
        self.buckets
            .retain(|_, record| now - record.last_refill < IDLE_EXPIRY_SECS);
    }
}
