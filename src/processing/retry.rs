//! Exponential backoff for the transient pipeline steps.

use std::future::Future;
use std::time::Duration;

use crate::processing::types::{FailureKind, PipelineStage, ProcessingError, StepError};

/// Attempt cap and base delay for one retryable step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2u32.pow(exponent))
    }

    /// Run `operation` for `stage`, retrying transient failures.
    ///
    /// Non-retryable stages get exactly one attempt. Fatal and invariant failures are returned
    /// immediately.
    pub async fn run<T, F, Fut>(
        &self,
        stage: PipelineStage,
        mut operation: F,
    ) -> Result<T, ProcessingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        let max_attempts = if stage.is_retryable() {
            self.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(source) => {
                    let error = ProcessingError::new(stage, source);
                    if error.kind != FailureKind::Transient || attempt >= max_attempts {
                        return Err(error);
                    }
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        stage = %stage,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error.source,
                        "Step failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::IdentifierError;
    use crate::summarization::SummarizationClientError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .run(PipelineStage::Summarizing, || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err(StepError::from(SummarizationClientError::GenerationFailed(
                            "busy".into(),
                        )))
                    } else {
                        Ok(call)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let error = RetryPolicy::immediate(3)
            .run(PipelineStage::Indexing, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(StepError::from(SummarizationClientError::ProviderUnavailable(
                        "down".into(),
                    )))
                }
            })
            .await
            .unwrap_err();
        assert_eq!(error.stage, PipelineStage::Indexing);
        assert_eq!(error.kind, FailureKind::Transient);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let error = RetryPolicy::immediate(3)
            .run(PipelineStage::Fetching, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(StepError::from(IdentifierError::MissingCongress(
                        String::new(),
                    )))
                }
            })
            .await
            .unwrap_err();
        assert_eq!(error.kind, FailureKind::Fatal);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deterministic_stages_run_once() {
        let calls = AtomicU32::new(0);
        let _ = RetryPolicy::immediate(5)
            .run(PipelineStage::Extracting, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(StepError::from(SummarizationClientError::GenerationFailed(
                        "x".into(),
                    )))
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
