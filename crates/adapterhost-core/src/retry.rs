// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policies for transient failures in feature implementations.
//!
//! A [`RetryPolicy`] is a pure function from a [`RetryContext`] to the delay
//! before the next attempt, or `None` to give up. Policies hold no per-call
//! state and can be shared freely.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::HostError;

/// State of an operation that has failed at least once.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Number of failed attempts so far (1 after the first failure).
    pub attempt: u32,
    /// Time since the first attempt started.
    pub elapsed: Duration,
    /// Display form of the most recent error.
    pub last_error: String,
}

/// Decides whether and when to retry.
pub trait RetryPolicy: Send + Sync {
    fn next_delay(&self, context: &RetryContext) -> Option<Duration>;
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _context: &RetryContext) -> Option<Duration> {
        None
    }
}

/// Retries after the same delay up to `max_attempts` total attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedDelay {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&self, context: &RetryContext) -> Option<Duration> {
        (context.attempt < self.max_attempts).then_some(self.delay)
    }
}

/// Exponential backoff: `initial_delay * multiplier^(attempt - 1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExponentialBackoff {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    pub max_attempts: u32,
    /// Give up once this much time has passed since the first attempt.
    #[serde(default)]
    pub max_elapsed: Option<Duration>,
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: default_multiplier(),
            max_attempts: 5,
            max_elapsed: None,
        }
    }
}

impl ExponentialBackoff {
    /// The uncapped-by-attempts delay after the given 1-based failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, context: &RetryContext) -> Option<Duration> {
        if context.attempt >= self.max_attempts {
            return None;
        }
        if let Some(max_elapsed) = self.max_elapsed
            && context.elapsed >= max_elapsed
        {
            return None;
        }
        Some(self.delay_for_attempt(context.attempt))
    }
}

/// Runs `operation` until it succeeds, the policy gives up, or `cancel` fires.
///
/// Returns the last error when the policy gives up and [`HostError::Cancelled`]
/// when cancelled while waiting.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &dyn RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, HostError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HostError>>,
{
    let started = Instant::now();
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(HostError::Cancelled);
        }
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        attempt += 1;
        let context = RetryContext {
            attempt,
            elapsed: started.elapsed(),
            last_error: err.to_string(),
        };
        let Some(delay) = policy.next_delay(&context) else {
            return Err(err);
        };
        debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying operation");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HostError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
