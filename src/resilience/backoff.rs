//! Retry with exponential backoff.
//!
//! # Responsibilities
//! - Run a fallible async action up to `max_tries` times
//! - Sleep between attempts, growing the delay by `factor` up to `max_delay`
//! - Fire the retry / cleanup / termination handlers at the protocol's edges
//!
//! # Protocol
//! ```text
//! attempt 1 ok                  → Success (no handler)
//! attempt 1 fails (retryable)   → on_retry, sleep, try again
//! attempt k ok after failures   → on_retry_cleanup → Success
//! max_tries retryable failures  → on_termination → Fail
//! non-retryable failure         → Err(Aborted) immediately
//! cancellation                  → Err(Cancelled), no handler
//! ```

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::HealthCheckConfig;

/// Classifies failures the backoff loop is allowed to retry.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Terminal result of a completed backoff run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Fail,
}

/// A backoff run that ended without an outcome.
#[derive(Debug, Error)]
pub enum BackoffError<E> {
    #[error("backoff cancelled")]
    Cancelled,

    #[error("non-retryable failure: {0}")]
    Aborted(E),
}

/// Delay and attempt limits for one backoff run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: u32,
    pub max_tries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
            factor: 2,
            max_tries: 1,
        }
    }
}

impl From<&HealthCheckConfig> for BackoffPolicy {
    fn from(config: &HealthCheckConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            factor: config.backoff_factor,
            max_tries: config.max_tries,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let multiplier = self.factor.saturating_pow(attempt - 1);
        self.initial_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

type Handler<'a> = Box<dyn FnMut() + Send + 'a>;

/// One backoff run with its handlers attached.
pub struct Backoff<'a> {
    policy: BackoffPolicy,
    on_retry: Option<Handler<'a>>,
    on_retry_cleanup: Option<Handler<'a>>,
    on_termination: Option<Handler<'a>>,
}

impl<'a> Backoff<'a> {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            on_retry: None,
            on_retry_cleanup: None,
            on_termination: None,
        }
    }

    /// Called once, on the first retryable failure.
    pub fn on_retry(mut self, handler: impl FnMut() + Send + 'a) -> Self {
        self.on_retry = Some(Box::new(handler));
        self
    }

    /// Called once, when an attempt succeeds after earlier failures.
    pub fn on_retry_cleanup(mut self, handler: impl FnMut() + Send + 'a) -> Self {
        self.on_retry_cleanup = Some(Box::new(handler));
        self
    }

    /// Called once, when every attempt failed.
    pub fn on_termination(mut self, handler: impl FnMut() + Send + 'a) -> Self {
        self.on_termination = Some(Box::new(handler));
        self
    }

    pub async fn execute<F, Fut, E>(
        mut self,
        mut action: F,
        cancel: &CancellationToken,
    ) -> Result<Outcome, BackoffError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Retryable + std::fmt::Display,
    {
        let max_tries = self.policy.max_tries;
        tracing::trace!(
            max_tries,
            initial_delay = ?self.policy.initial_delay,
            max_delay = ?self.policy.max_delay,
            "Starting backoff run"
        );

        for attempt in 1..=max_tries {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BackoffError::Cancelled),
                result = action() => result,
            };

            match result {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(failures = attempt - 1, "Succeeded after retries");
                        fire(&mut self.on_retry_cleanup);
                    }
                    return Ok(Outcome::Success);
                }
                Err(e) if !e.is_retryable() => return Err(BackoffError::Aborted(e)),
                Err(e) => {
                    if attempt == 1 {
                        tracing::info!(error = %e, "Target unavailable, starting retries");
                        fire(&mut self.on_retry);
                    }

                    if attempt < max_tries {
                        let delay = self.policy.delay_for(attempt);
                        tracing::debug!(attempt, max_tries, delay = ?delay, error = %e, "Attempt failed, backing off");
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(BackoffError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    } else {
                        tracing::debug!(attempt, max_tries, error = %e, "Final attempt failed");
                    }
                }
            }
        }

        tracing::warn!(max_tries, "All attempts failed, running termination handler");
        fire(&mut self.on_termination);
        Ok(Outcome::Fail)
    }
}

fn fire(handler: &mut Option<Handler<'_>>) {
    if let Some(h) = handler.as_mut() {
        h();
    }
}
