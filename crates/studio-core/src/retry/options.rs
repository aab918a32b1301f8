use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::billing::{BillingPolicy, ClassifyProviderError, ErrorClass};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Per-call retry configuration.
///
/// Options are immutable once handed to a retry call. Builders normalise
/// out-of-range values instead of failing: zero attempts becomes one, and a
/// multiplier below one (or not finite) becomes `1.0`. Env-driven settings
/// reject those values up front, see [`crate::config::RetrySettings`].
pub struct RetryOptions<E> {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
    max_delay: Option<Duration>,
    is_retryable: RetryPredicate<E>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp(GiveUpReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    NonRetryable,
    Exhausted,
}

impl GiveUpReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NonRetryable => "non_retryable",
            Self::Exhausted => "exhausted",
        }
    }
}

impl<E> RetryOptions<E> {
    pub fn new<P>(is_retryable: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: None,
            is_retryable: Arc::new(is_retryable),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = if backoff_multiplier.is_finite() && backoff_multiplier >= 1.0 {
            backoff_multiplier
        } else {
            1.0
        };
        self
    }

    pub fn with_max_delay(mut self, max_delay: Option<Duration>) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_predicate<P>(mut self, is_retryable: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Arc::new(is_retryable);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    pub fn is_retryable(&self, error: &E) -> bool {
        (self.is_retryable)(error)
    }

    /// Decides what follows a failed `attempt` (counted from 1).
    ///
    /// A non-retryable error stops the sequence even when attempts remain.
    pub fn decide(&self, attempt: u32, error: &E) -> RetryDecision {
        if !self.is_retryable(error) {
            return RetryDecision::GiveUp(GiveUpReason::NonRetryable);
        }
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp(GiveUpReason::Exhausted);
        }
        RetryDecision::Retry {
            delay: self.delay_for_retry(attempt.saturating_sub(1)),
        }
    }

    /// Delay before the retry at `retry_index` (0-indexed):
    /// `initial_delay * backoff_multiplier^retry_index`, capped by `max_delay`.
    pub fn delay_for_retry(&self, retry_index: u32) -> Duration {
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        let nanos = self.initial_delay.as_nanos() as f64 * factor;

        let delay = if nanos.is_finite() && nanos < u64::MAX as f64 {
            Duration::from_nanos(nanos.round() as u64)
        } else {
            Duration::MAX
        };

        match self.max_delay {
            Some(max_delay) => delay.min(max_delay),
            None => delay,
        }
    }
}

impl<E> RetryOptions<E>
where
    E: ClassifyProviderError + 'static,
{
    /// Retries everything except errors `policy` classifies as billing.
    pub fn with_billing_policy(self, policy: BillingPolicy) -> Self {
        self.with_predicate(move |error: &E| error.error_class(&policy) != ErrorClass::Billing)
    }
}

impl<E> Default for RetryOptions<E>
where
    E: ClassifyProviderError + 'static,
{
    fn default() -> Self {
        Self::new(|_: &E| true).with_billing_policy(BillingPolicy::default())
    }
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            backoff_multiplier: self.backoff_multiplier,
            max_delay: self.max_delay,
            is_retryable: Arc::clone(&self.is_retryable),
        }
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}
