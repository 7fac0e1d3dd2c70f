// src/provider/retry.rs — Bounded retry with exponential backoff
//
// Wraps a single provider operation. Retries transient failures (timeouts,
// 5xx, empty output) in place. Quota and fatal failures end the attempt loop
// at once so the fallback chain can move to another provider.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::classifier::{FailureClass, QuotaClassifier};
use super::Payload;
use crate::infra::errors::GenerationError;

/// Default retry configuration.
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY_MS: u64 = 1_000;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 8_000;
const JITTER_FRACTION: f64 = 0.2;
const ATTEMPT_TIMEOUT_SECS: u64 = 25;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub jitter_fraction: f64,
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay_ms: INITIAL_DELAY_MS,
            backoff_factor: BACKOFF_FACTOR,
            max_delay_ms: MAX_DELAY_MS,
            jitter_fraction: JITTER_FRACTION,
            attempt_timeout_secs: ATTEMPT_TIMEOUT_SECS,
        }
    }
}

impl RetryConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// A payload and the attempt that produced it (1-indexed).
#[derive(Debug)]
pub struct Succeeded<T> {
    pub payload: T,
    pub attempts: u32,
}

/// Why a retried operation stopped.
#[derive(Debug)]
pub struct RetryFailure {
    pub error: GenerationError,
    pub class: FailureClass,
    pub attempts: u32,
}

/// Re-invokes one operation until it yields a non-empty payload.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_factor: f64,
    max_delay: Duration,
    jitter_fraction: f64,
    attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor.max(1.0),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_fraction: config.jitter_fraction.clamp(0.0, 1.0),
            attempt_timeout: config.attempt_timeout(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Calculate the delay after a failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.jitter_fraction);
        Duration::from_millis((capped_ms * jitter).max(0.0) as u64)
    }

    /// Run `operation` up to `max_attempts` times.
    ///
    /// Blank payloads count as failures. On exhaustion the most recent
    /// failure is returned, not the first.
    pub async fn run<T, F, Fut>(
        &self,
        provider_id: &str,
        classifier: &QuotaClassifier,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<Succeeded<T>, RetryFailure>
    where
        T: Payload,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryFailure {
                    error: GenerationError::Cancelled,
                    class: FailureClass::Fatal,
                    attempts: attempt,
                });
            }
            attempt += 1;

            let error = match tokio::time::timeout(self.attempt_timeout, operation()).await {
                Ok(Ok(payload)) if !payload.is_blank() => {
                    tracing::debug!(provider = provider_id, attempt, "Provider succeeded");
                    return Ok(Succeeded {
                        payload,
                        attempts: attempt,
                    });
                }
                Ok(Ok(_)) => GenerationError::EmptyResponse {
                    provider: provider_id.to_string(),
                },
                Ok(Err(e)) => e,
                Err(_) => GenerationError::Timeout {
                    provider: provider_id.to_string(),
                    after_ms: self.attempt_timeout.as_millis() as u64,
                },
            };

            let class = classifier.classify(&error);
            if !class.is_retryable_in_place() || attempt >= self.max_attempts {
                return Err(RetryFailure {
                    error,
                    class,
                    attempts: attempt,
                });
            }

            let delay = self.delay_for_attempt(attempt - 1);
            tracing::warn!(
                provider = provider_id,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying after {class} error: {}",
                error
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(RetryFailure {
                        error: GenerationError::Cancelled,
                        class: FailureClass::Fatal,
                        attempts: attempt,
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in tests.
/// Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64; // 0.0..1.0
    1.0 + fraction * (2.0 * hash - 1.0)
}
