//! Retry policy — exponential backoff plus quota-error detection.
//!
//! Quota/rate-limit failures reflect upstream capacity, not a defect in
//! the task, so they retry on the normal backoff schedule without ever
//! counting toward permanent failure.

use chrono::Duration;

/// Default maximum attempts before an action is permanently failed.
pub const MAX_RETRIES: u32 = 10;
/// First backoff delay.
pub const INITIAL_BACKOFF_SECS: i64 = 30;
/// Backoff ceiling.
pub const MAX_BACKOFF_SECS: i64 = 600;

/// Case-insensitive substrings that mark an error as quota/rate-limit.
const QUOTA_PATTERNS: &[&str] = &[
    "quota",
    "rate limit",
    "too many requests",
    "429",
    "resource exhausted",
    "capacity",
    "overloaded",
];

/// What the dispatcher should do with a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue with the given delay. `count_attempt` is false for
    /// quota errors, which do not advance `retry_count`.
    Retry {
        delay: Duration,
        count_attempt: bool,
    },
    /// Retry budget exhausted — fail permanently.
    Fail,
}

/// Retry policy knobs. `Default` matches production settings.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::seconds(INITIAL_BACKOFF_SECS),
            max_backoff: Duration::seconds(MAX_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay for the given retry count:
    /// `min(initial * 2^retry_count, max)` — 30s, 60s, 120s, ..., 600s.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let base = self.initial_backoff.num_seconds();
        // Cap the exponent well past the ceiling rather than overflowing.
        let delay = base.saturating_mul(1i64 << retry_count.min(32));
        Duration::seconds(delay.min(self.max_backoff.num_seconds()))
    }

    /// Classify a failed attempt. `retry_count` is the count *before*
    /// this failure.
    pub fn decide(&self, error: &str, retry_count: u32) -> RetryDecision {
        if is_quota_error(error) {
            // Transient by construction: retry forever, don't count it.
            return RetryDecision::Retry {
                delay: self.backoff_delay(retry_count),
                count_attempt: false,
            };
        }
        if retry_count < self.max_retries {
            // Counted failure: the delay tracks the post-increment count.
            RetryDecision::Retry {
                delay: self.backoff_delay(retry_count + 1),
                count_attempt: true,
            }
        } else {
            RetryDecision::Fail
        }
    }
}

/// Whether an error message looks like upstream rate/capacity limiting.
pub fn is_quota_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    QUOTA_PATTERNS.iter().any(|p| lower.contains(p))
}
