//! Resilient operation wrapper.
//!
//! Every remote call made by the system is funnelled through
//! [`ResilientExecutor::run`], which owns the retry policy:
//!
//! - NotFound means the goal is already met and is never retried
//! - rate limits sleep for the server's hint, transient faults for the
//!   current backoff, then retry
//! - anything else is terminal

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::RetryConfig;
use crate::error::{FailureClass, RemoteError};

/// Exponential backoff state, fresh for every operation.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
    multiplier: f64,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        let max = config.max_backoff();
        Self {
            current: config.initial_backoff().min(max),
            max,
            multiplier: config.multiplier.max(1.0),
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Grow the delay, saturating at the ceiling
    pub fn advance(&mut self) {
        let next = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max);
        self.current = next.min(self.max);
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current;
        self.advance();
        Some(delay)
    }
}

/// Terminal failure of one wrapped operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed after {attempts} attempt(s): {error}")]
pub struct OperationFailure {
    pub operation: String,
    pub attempts: u32,
    pub error: RemoteError,
    /// True when the retry ceiling was hit rather than a permanent failure
    pub exhausted: bool,
}

/// Result of a wrapped operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome<T> {
    Completed(T),
    /// The remote reported NotFound
    AlreadyAbsent,
    Failed(OperationFailure),
}

impl<T> OperationOutcome<T> {
    /// Completed or already absent
    pub fn is_success(&self) -> bool {
        !matches!(self, OperationOutcome::Failed(_))
    }

    pub fn value(self) -> Option<T> {
        match self {
            OperationOutcome::Completed(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Option<T>, OperationFailure> {
        match self {
            OperationOutcome::Completed(v) => Ok(Some(v)),
            OperationOutcome::AlreadyAbsent => Ok(None),
            OperationOutcome::Failed(f) => Err(f),
        }
    }
}

/// Runs remote calls under the retry policy
#[derive(Debug, Clone, Default)]
pub struct ResilientExecutor {
    config: RetryConfig,
}

impl ResilientExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `call` until it succeeds, fails permanently, or exhausts the
    /// retry ceiling. `call` is invoked once per attempt.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> OperationOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = Backoff::new(&self.config);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match call().await {
                Ok(value) => return OperationOutcome::Completed(value),
                Err(err) => err,
            };

            match err.classify() {
                FailureClass::AlreadyAbsent => {
                    debug!(operation, "Target already absent");
                    return OperationOutcome::AlreadyAbsent;
                }
                FailureClass::Permanent => {
                    warn!(operation, attempt, error = %err, "Remote operation failed permanently");
                    return OperationOutcome::Failed(OperationFailure {
                        operation: operation.to_string(),
                        attempts: attempt,
                        error: err,
                        exhausted: false,
                    });
                }
                FailureClass::Retryable { hint } => {
                    if attempt >= max_attempts {
                        error!(operation, attempts = attempt, error = %err, "Retry ceiling reached");
                        return OperationOutcome::Failed(OperationFailure {
                            operation: operation.to_string(),
                            attempts: attempt,
                            error: err,
                            exhausted: true,
                        });
                    }

                    let delay = hint.unwrap_or_else(|| backoff.current());
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying remote operation"
                    );
                    tokio::time::sleep(delay).await;
                    backoff.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn server_fault() -> RemoteError {
        RemoteError::ServerFault {
            status: 503,
            message: "unavailable".into(),
        }
    }

    #[test]
    fn test_backoff_sequence() {
        let delays: Vec<_> = Backoff::new(&RetryConfig::default()).take(9).collect();
        assert_eq!(delays[0], Duration::from_millis(500));
        assert_eq!(delays[1], Duration::from_secs(1));
        assert_eq!(delays[2], Duration::from_secs(2));
        assert_eq!(delays[6], Duration::from_secs(30));
        assert_eq!(delays[8], Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_success_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let exec = ResilientExecutor::default();

        let counter = calls.clone();
        let outcome: OperationOutcome<()> = exec
            .run("delete role", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RemoteError::NotFound) }
            })
            .await;

        assert_eq!(outcome, OperationOutcome::AlreadyAbsent);
        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let exec = ResilientExecutor::default();

        let counter = calls.clone();
        let outcome: OperationOutcome<()> = exec
            .run("create role", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RemoteError::Forbidden("missing access".into())) }
            })
            .await;

        match outcome {
            OperationOutcome::Failed(f) => {
                assert_eq!(f.attempts, 1);
                assert!(!f.exhausted);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_fault_backs_off_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let exec = ResilientExecutor::default();
        let start = Instant::now();

        let counter = calls.clone();
        let outcome = exec
            .run("create channel", || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(server_fault())
                    } else {
                        Ok(7u32)
                    }
                }
            })
            .await;

        assert_eq!(outcome, OperationOutcome::Completed(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 500ms then 1s
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_restarts_for_each_operation() {
        let exec = ResilientExecutor::default();

        // First operation burns through two delays
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let first = exec
            .run("delete channel", || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(server_fault())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(first.is_success());

        // Second operation on the same executor sleeps the initial delay again
        let start = Instant::now();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let second = exec
            .run("delete category", || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(server_fault())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(second.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_uses_server_hint() {
        let calls = Arc::new(AtomicU32::new(0));
        let exec = ResilientExecutor::default();
        let start = Instant::now();

        let counter = calls.clone();
        let outcome = exec
            .run("create role", || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(RemoteError::RateLimited {
                            retry_after: Duration::from_secs(3),
                        })
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(outcome.is_success());
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling() {
        let calls = Arc::new(AtomicU32::new(0));
        let exec = ResilientExecutor::default();

        let counter = calls.clone();
        let outcome: OperationOutcome<()> = exec
            .run("create category", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(server_fault()) }
            })
            .await;

        match outcome {
            OperationOutcome::Failed(f) => {
                assert!(f.exhausted);
                assert_eq!(f.attempts, 5);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
