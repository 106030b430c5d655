//! Bounded retry with increasing backoff.
//!
//! ### Classification
//! - Timeouts and connection failures are always retried.
//! - HTTP statuses are retried only when the source's [`RetryConfig`] lists
//!   them (or, with `retry_client_errors`, for any 4xx).
//! - Everything else (oversized body, invalid URL) fails on the spot.
//!
//! ### Delays
//! Before attempt `k + 1` the policy waits `base * k` (linear) or
//! `base * 2^(k-1)` (exponential). Waiting goes through a [`Sleeper`] so
//! tests run without real time passing.
//!
//! ### Logging
//! A failed attempt is logged at info on the first try, warn while attempts
//! remain, and error on the last one. A success after failures is a warn.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use noticefeed_core::Error;
use noticefeed_core::config::{Backoff, RetryConfig};

/// Something that can wait.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real waiting on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry policy for one source.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn attempts(&self) -> u32 {
        self.config.attempts.max(1)
    }

    /// Delay to wait after `failed` attempts have failed.
    pub fn delay_after(&self, failed: u32) -> Duration {
        let base = self.config.base_delay();
        match self.config.backoff {
            Backoff::Linear => base.saturating_mul(failed),
            Backoff::Exponential => base.saturating_mul(2u32.saturating_pow(failed.saturating_sub(1))),
        }
    }

    /// Apply this source's status classification to an error.
    pub fn classify(&self, error: Error) -> Error {
        match error {
            Error::HttpStatus { status, .. } => {
                Error::HttpStatus { status, retryable: self.config.is_retryable_status(status) }
            }
            other => other,
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempts run out.
    ///
    /// `operation` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the operation's error unchanged when it is not retryable, and
    /// [`Error::FetchExhausted`] carrying the last error once every attempt failed.
    pub async fn execute<T, F, Fut>(&self, label: &str, sleeper: &dyn Sleeper, mut operation: F) -> Result<T, Error>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;

        loop {
            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::warn!(source = label, attempt, "recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) => self.classify(e),
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if attempt >= attempts {
                tracing::error!(source = label, attempt, attempts, error = %error, "attempt failed, giving up");
                return Err(Error::FetchExhausted { attempts: attempt, last: Box::new(error) });
            }

            let delay = self.delay_after(attempt);
            if attempt == 1 {
                tracing::info!(source = label, attempt, attempts, error = %error, delay_ms = delay.as_millis() as u64, "attempt failed, retrying");
            } else {
                tracing::warn!(source = label, attempt, attempts, error = %error, delay_ms = delay.as_millis() as u64, "attempt failed, retrying");
            }

            sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}
