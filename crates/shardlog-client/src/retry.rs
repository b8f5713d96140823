//! Retry Policy with Jittered Exponential Backoff
//!
//! This module bounds how hard the [`RecordWriter`](crate::writer::RecordWriter)
//! pushes a batch that keeps coming back with failed entries, and how long it
//! waits between rounds.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ write(batch) │ RecordWriter
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────────────────────┐
//! │  RetryPolicy                 │
//! │  - max_retries: 10           │
//! │  - initial_backoff: 100ms    │
//! │  - max_backoff: 10s          │
//! │  - backoff_multiplier: 2.0   │
//! └──────┬───────────────────────┘
//!        │
//!        ├─→ Round 1: full batch, immediate
//!        ├─→ Round 2: failed subset, wait ~100ms
//!        ├─→ Round 3: failed subset, wait ~200ms
//!        ├─→ Round 4: failed subset, wait ~400ms
//!        └─→ ...      until nothing fails or the budget is spent
//! ```
//!
//! ## Retryable vs Non-Retryable Errors
//!
//! Per-entry failures inside a `put_records` response are always retried.
//! A whole-call failure is retried only when the service rejected the request
//! before applying any of it:
//!
//! **Retryable**:
//! - `ProvisionedThroughputExceeded`: shard is throttling writes
//! - `LimitExceeded`: account-level limit
//!
//! **Non-Retryable**:
//! - `Unavailable`, `Internal`, `Transport`: the batch may already have been
//!   applied, resubmitting it could store every entry twice
//! - `ResourceNotFound`: stream or shard missing
//! - `InvalidArgument`: bad request (won't succeed on retry)
//! - `ExpiredIterator`: cursor past its validity window
//!
//! ## Examples
//!
//! ```ignore
//! use shardlog_client::RetryPolicy;
//!
//! let policy = RetryPolicy::new(
//!     5,
//!     Duration::from_millis(50),
//!     Duration::from_secs(5),
//!     2.0,
//! );
//! ```

use crate::service::{ServiceError, ServiceErrorKind};
use std::time::Duration;

/// How many extra write rounds a batch gets, and how long to wait before each.
///
/// # Backoff Calculation
///
/// ```text
/// backoff = min(initial_backoff * multiplier^attempt, max_backoff)
/// jittered = backoff * (0.75 + random(0.0, 0.5))
///
/// Example with defaults (100ms initial, 2x multiplier, 10s max):
/// - Retry 1: ~100ms
/// - Retry 2: ~200ms
/// - Retry 3: ~400ms
/// - Retry 7: ~6.4s
/// - Retry 8+: capped at ~10s
/// ```
///
/// `max_retries` counts rounds *after* the first submission, so a batch is
/// submitted at most `max_retries + 1` times.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Rounds allowed after the first submission
    pub max_retries: usize,

    /// Wait before the first retry round
    pub initial_backoff: Duration,

    /// Upper bound for any single wait
    pub max_backoff: Duration,

    /// Growth factor between consecutive waits (at least 1.0)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    /// - max_retries: 10
    /// - initial_backoff: 100ms
    /// - max_backoff: 10s
    /// - backoff_multiplier: 2.0
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: usize,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// Wait before retry round `attempt + 1`, without jitter.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.min(i32::MAX as usize) as i32;
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        if !backoff_ms.is_finite() || backoff_ms >= self.max_backoff.as_millis() as f64 {
            return self.max_backoff;
        }
        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    /// [`backoff`](Self::backoff) scaled by a random factor in `0.75..1.25`.
    ///
    /// Spreads out writers that were throttled at the same moment.
    pub fn jittered_backoff(&self, attempt: usize) -> Duration {
        let base_backoff = self.backoff(attempt);
        let jitter = 0.75 + (rand::random::<f64>() * 0.5); // 0.75-1.25x
        Duration::from_millis((base_backoff.as_millis() as f64 * jitter) as u64)
    }

    /// Check if a whole-call service error is safe to retry.
    ///
    /// Only rejections that guarantee nothing was written qualify.
    pub fn is_retryable(&self, error: &ServiceError) -> bool {
        match error.kind {
            // Rejected up front, nothing applied
            ServiceErrorKind::ProvisionedThroughputExceeded => true,
            ServiceErrorKind::LimitExceeded => true,

            // Outcome unknown
            ServiceErrorKind::Unavailable => false,
            ServiceErrorKind::Internal => false,
            ServiceErrorKind::Transport => false,

            // Resubmitting the same request cannot help
            ServiceErrorKind::ResourceNotFound => false,
            ServiceErrorKind::InvalidArgument => false,
            ServiceErrorKind::ExpiredIterator => false,
        }
    }
}
