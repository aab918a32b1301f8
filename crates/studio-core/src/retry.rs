//! Retry wrapper for calls to external AI and image-generation providers.
//!
//! An operation is a closure producing a fresh future per attempt. The
//! wrapper runs it up to `max_attempts` times with exponential backoff
//! between attempts, stops immediately on errors the options' predicate
//! rejects, and always surfaces the error of the last attempt it made.

use std::fmt;
use std::future::Future;

use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

mod delay;
mod options;


pub use delay::{Cancelled, cancellable_sleep};
pub use options::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, GiveUpReason,
    RetryDecision, RetryOptions, RetryPredicate,
};

use delay::duration_to_millis;

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("{0}")]
    Operation(E),
    #[error("retry sequence cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error,
/// or exhausts `options.max_attempts()`.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut operation: F,
    options: &RetryOptions<E>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 1_u32;

    loop {
        let err = match operation().await {
            Ok(value) => {
                trace_success(attempt);
                return Ok(value);
            }
            Err(err) => err,
        };

        match options.decide(attempt, &err) {
            RetryDecision::Retry { delay } => {
                trace_retry(attempt, options.max_attempts(), delay, &err);
                sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
            RetryDecision::GiveUp(reason) => {
                trace_give_up(attempt, reason, &err);
                return Err(err);
            }
        }
    }
}

/// Same as [`retry_with_backoff`], but aborts when `token` is cancelled.
///
/// Cancellation is observed before each attempt, while an attempt is in
/// flight (its future is dropped), and during the backoff delay.
pub async fn retry_with_cancel<T, E, F, Fut>(
    mut operation: F,
    options: &RetryOptions<E>,
    token: &CancellationToken,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 1_u32;

    loop {
        if token.is_cancelled() {
            return Err(cancelled(attempt.saturating_sub(1)));
        }

        // An attempt that completes alongside cancellation keeps its result.
        let result = tokio::select! {
            biased;
            result = operation() => result,
            () = token.cancelled() => return Err(cancelled(attempt)),
        };

        let err = match result {
            Ok(value) => {
                trace_success(attempt);
                return Ok(value);
            }
            Err(err) => err,
        };

        match options.decide(attempt, &err) {
            RetryDecision::Retry { delay } => {
                trace_retry(attempt, options.max_attempts(), delay, &err);
                if cancellable_sleep(delay, token).await.is_err() {
                    return Err(cancelled(attempt));
                }
                attempt = attempt.saturating_add(1);
            }
            RetryDecision::GiveUp(reason) => {
                trace_give_up(attempt, reason, &err);
                return Err(RetryError::Operation(err));
            }
        }
    }
}

fn cancelled<E>(attempts: u32) -> RetryError<E> {
    debug!(attempts, "retry sequence cancelled");
    RetryError::Cancelled { attempts }
}

fn trace_success(attempt: u32) {
    if attempt > 1 {
        debug!(attempts = attempt, "operation succeeded after retry");
    }
}

fn trace_retry(attempt: u32, max_attempts: u32, delay: std::time::Duration, err: &impl fmt::Display) {
    debug!(
        attempt,
        max_attempts,
        delay_ms = duration_to_millis(delay),
        error = %err,
        "attempt failed, retrying after backoff"
    );
}

fn trace_give_up(attempt: u32, reason: GiveUpReason, err: &impl fmt::Display) {
    debug!(
        attempts = attempt,
        reason = reason.as_str(),
        error = %err,
        "giving up on operation"
    );
}
