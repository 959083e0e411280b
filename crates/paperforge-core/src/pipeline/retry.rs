//! Bounded retry policy for external calls.
//!
//! Every LLM generation, validator judgement, and tool invocation runs under
//! the same policy: a fixed number of attempts, a fixed delay between them,
//! and a timeout per attempt. Timeouts count as failed attempts. Exhaustion
//! is fatal for the workflow run.

use std::future::Future;
use std::time::Duration;

use paperforge_types::config::RetrySettings;
use paperforge_types::llm::LlmError;
use paperforge_types::pipeline::Step;
use paperforge_types::tool::ToolError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A single failed attempt of an external call.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("call timed out after {0:?}")]
    TimedOut(Duration),
}

/// Every attempt of a call failed.
#[derive(Debug, Error)]
#[error("step '{step}': call '{call}' failed after {attempts} attempts: {last}")]
pub struct RetryExhausted {
    pub step: Step,
    pub call: String,
    pub attempts: u32,
    pub last: CallError,
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Fixed-delay retry with a per-attempt timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, call_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            call_timeout,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.delay_ms),
            Duration::from_secs(settings.call_timeout_secs),
        )
    }

    /// Whether another attempt follows a failed attempt `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `call` names the operation in logs and in the exhaustion error.
    pub async fn run<T, F, Fut>(&self, step: Step, call: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let error = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        tracing::debug!(step = %step, call, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => e,
                Err(_) => CallError::TimedOut(self.call_timeout),
            };

            if !self.should_retry(attempt) {
                tracing::error!(
                    step = %step,
                    call,
                    attempt,
                    max_attempts = self.max_attempts,
                    error = %error,
                    "call failed, retry budget exhausted"
                );
                return Err(RetryExhausted {
                    step,
                    call: call.to_string(),
                    attempts: attempt,
                    last: error,
                });
            }

            tracing::warn!(
                step = %step,
                call,
                attempt,
                max_attempts = self.max_attempts,
                error = %error,
                "call failed, retrying"
            );

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}
