//! Retry mechanisms for device sessions and configuration pushes.
//!
//! This module provides:
//! - Constant, linear or exponential backoff capped at a maximum delay
//! - Optional jitter so parallel retries against one device spread out
//! - A predicate deciding which errors are worth another attempt
//!
//! # Example
//!
//! ```rust,ignore
//! use vlanprobe::retry::{RetryPolicy, BackoffStrategy, JitterStrategy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_retries(3)
//!     .initial_delay(Duration::from_secs(2))
//!     .backoff(BackoffStrategy::Exponential { multiplier: 2.0 })
//!     .jitter(JitterStrategy::Equal)
//!     .build();
//!
//! let result = policy
//!     .execute_if(|| async { push_config().await }, |e| e.is_transient())
//!     .await;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Backoff strategy for calculating delay between retries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,

    /// Linear backoff: delay = initial_delay * (attempt + 1)
    Linear,

    /// Exponential backoff: delay = initial_delay * multiplier^attempt
    Exponential {
        /// Multiplier for exponential growth (default: 2.0)
        multiplier: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential { multiplier: 2.0 }
    }
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn calculate_delay(&self, attempt: u32, initial_delay: Duration) -> Duration {
        let base_millis = initial_delay.as_millis() as f64;

        let delay_millis = match self {
            Self::Constant => base_millis,
            Self::Linear => base_millis * (f64::from(attempt) + 1.0),
            Self::Exponential { multiplier } => base_millis * multiplier.powf(f64::from(attempt)),
        };

        Duration::from_millis(delay_millis.max(0.0) as u64)
    }
}

/// Jitter strategy for adding randomness to delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter - use exact calculated delay.
    None,

    /// Full jitter: random value between 0 and calculated delay.
    Full,

    /// Equal jitter: half the delay plus random jitter up to the other half.
    #[default]
    Equal,
}

impl JitterStrategy {
    /// Apply jitter to a calculated delay.
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = delay.as_millis() as u64;
        if millis == 0 {
            return delay;
        }
        let mut rng = rand::thread_rng();

        let jittered = match self {
            Self::None => millis,
            Self::Full => rng.gen_range(0..=millis),
            Self::Equal => {
                let half = millis / 2;
                half + rng.gen_range(0..=millis - half)
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 means no retries, just the initial attempt).
    pub max_retries: u32,

    /// Initial delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (caps exponential growth).
    pub max_delay: Duration,

    /// Backoff strategy for calculating delays.
    pub backoff: BackoffStrategy,

    /// Jitter strategy for adding randomness.
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Create a policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create a policy with simple constant delay retries.
    pub fn constant(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            max_delay: delay,
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
        }
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate the delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.backoff.calculate_delay(attempt, self.initial_delay);
        self.jitter.apply(base_delay.min(self.max_delay))
    }

    /// Execute an async operation, retrying every error.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_if(operation, |_| true).await
    }

    /// Execute an async operation, retrying only errors for which
    /// `retry_if` returns true.
    pub async fn execute_if<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        retry_if: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;

        loop {
            debug!("Retry attempt {} of {}", attempt + 1, self.max_attempts());

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retry attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt + 1, e);

                    if !retry_if(&e) {
                        return Err(RetryError::NotRetryable {
                            attempts: attempt + 1,
                            error: e,
                        });
                    }
                    if attempt >= self.max_retries {
                        return Err(RetryError::MaxRetriesExceeded {
                            attempts: attempt + 1,
                            last_error: e,
                        });
                    }

                    let delay = self.delay_for_attempt(attempt);
                    debug!("Waiting {:?} before retry", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Builder for constructing `RetryPolicy` instances.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.policy.max_retries = n;
        self
    }

    /// Set the initial delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.policy.backoff = strategy;
        self
    }

    /// Set the jitter strategy.
    pub fn jitter(mut self, strategy: JitterStrategy) -> Self {
        self.policy.jitter = strategy;
        self
    }

    /// Build the `RetryPolicy`.
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Error type for retry operations.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Maximum number of retries exceeded.
    MaxRetriesExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// The last error encountered.
        last_error: E,
    },

    /// The operation failed with an error not worth retrying.
    NotRetryable {
        /// Number of attempts made.
        attempts: u32,
        /// The error that stopped retrying.
        error: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::MaxRetriesExceeded { attempts, .. } | Self::NotRetryable { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The final underlying error.
    pub fn into_inner(self) -> E {
        match self {
            Self::MaxRetriesExceeded { last_error, .. } => last_error,
            Self::NotRetryable { error, .. } => error,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaxRetriesExceeded {
                attempts,
                last_error,
            } => write!(f, "gave up after {attempts} attempts: {last_error}"),
            Self::NotRetryable { attempts, error } => {
                write!(f, "failed on attempt {attempts}: {error}")
            }
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}
