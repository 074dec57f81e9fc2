use std::sync::Arc;
use std::time::Duration;
use reqwest::StatusCode;

/// Spacing between consecutive attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// `base * n` after the n-th failed attempt
    Linear,
    /// `base * 2^(n - 1)` after the n-th failed attempt
    Exponential,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    backoff: Backoff,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, 5000)
    }
}

impl RetryPolicy {
    /// A budget of zero still performs the call once.
    pub fn new(max_attempts: u32, base_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff: Duration::from_millis(base_backoff_ms),
            backoff: Backoff::Linear,
            max_backoff: Duration::from_secs(60),
        }
    }

    pub fn disabled() -> Self {
        Self::new(1, 0)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep to take after the given (1-based) attempt failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.base_backoff.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 2u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
                self.base_backoff.saturating_mul(factor)
            }
        };
        delay.min(self.max_backoff)
    }
}

/// What a single attempt produced when it did not come back clean.
#[derive(Debug)]
pub enum RetryCandidate<'a> {
    Transport(&'a reqwest::Error),
    Status(StatusCode),
}

/// Decides whether a failed attempt is worth another go.
pub type RetryPredicate = Arc<dyn Fn(&RetryCandidate<'_>) -> bool + Send + Sync>;

pub fn default_predicate() -> RetryPredicate {
    Arc::new(is_transient)
}

/// Only retries when the request never reached the server. Meant for
/// mutating calls the upstream does not treat as idempotent.
pub fn connect_only_predicate() -> RetryPredicate {
    Arc::new(|candidate: &RetryCandidate<'_>| match candidate {
        RetryCandidate::Transport(e) => e.is_connect(),
        RetryCandidate::Status(_) => false,
    })
}

pub fn is_transient(candidate: &RetryCandidate<'_>) -> bool {
    match candidate {
        RetryCandidate::Transport(e) => {
            !e.is_builder() && (e.is_timeout() || e.is_connect() || e.is_request())
        }
        RetryCandidate::Status(status) => is_retryable_status(*status),
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}
