//! Bounded retry bookkeeping for queued operations.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use finpro_common::Error;

/// Default total attempts per operation (initial plus two retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What to do with an operation after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back to pending with the new retry count.
    Requeue { retry_count: u32 },
    /// Terminal; keep the entry for inspection with its retry count as is.
    Fail,
}

/// Configuration for retry behavior.
///
/// Retries are not timed: a requeued operation waits for the next drain
/// trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Decide the fate of an operation whose attempt just failed.
    ///
    /// `retry_count` is the count before this attempt. Errors that another
    /// attempt cannot fix fail immediately.
    pub fn on_failure(&self, retry_count: u32, err: &Error) -> RetryDecision {
        if !err.is_transient() {
            warn!(error = %err, "Permanent failure, not retrying");
            return RetryDecision::Fail;
        }

        let attempts = retry_count.saturating_add(1);
        if attempts >= self.max_attempts {
            warn!(attempts, error = %err, "Retry cap reached");
            RetryDecision::Fail
        } else {
            debug!(attempts, error = %err, "Attempt failed, will retry");
            RetryDecision::Requeue {
                retry_count: retry_count + 1,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
