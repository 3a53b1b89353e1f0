//! Bounded exponential backoff for transient failures.

use std::{future::Future, time::Duration};

use rollup_attestation_client::AttestationError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::Error;

/// Retry policy for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub interval: Duration,
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Upper bound of a single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy whose delay is capped at eight times the base interval.
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
            max_delay: interval.saturating_mul(8),
        }
    }

    /// Returns the delay before retry number `attempt` (starting at 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.interval.saturating_mul(factor).min(self.max_delay)
    }
}

/// Classifies errors as transient or terminal.
pub trait Retryable {
    /// Returns `true` if attempting the operation again may succeed.
    fn is_retryable(&self) -> bool;
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        Error::is_retryable(self)
    }
}

impl Retryable for AttestationError {
    fn is_retryable(&self) -> bool {
        AttestationError::is_retryable(self)
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Shutdown was requested while waiting.
    Cancelled,
    /// Every attempt failed with a transient error.
    Exhausted { attempts: u32, last: E },
    /// An attempt failed with a terminal error.
    Terminal(E),
}

impl From<RetryError<Error>> for Error {
    fn from(err: RetryError<Error>) -> Self {
        match err {
            RetryError::Cancelled => Error::Cancelled,
            RetryError::Exhausted { attempts, last } => Error::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
            RetryError::Terminal(e) => e,
        }
    }
}

/// Runs `op` until it succeeds, fails with a terminal error, or the policy is exhausted.
///
/// The delay between attempts is interrupted by `shutdown_token`.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    shutdown_token: &CancellationToken,
    operation: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        let result = tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => return Err(RetryError::Cancelled),
            result = op() => result,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(RetryError::Terminal(e)),
            Err(e) => e,
        };

        attempt += 1;
        if attempt > policy.max_retries {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        let delay = policy.delay(attempt);
        warn!(
            operation,
            attempt,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient failure, retrying"
        );

        tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Like [`retry`] with the prover's error type.
pub async fn retry_rpc<T, F, Fut>(
    policy: &RetryPolicy,
    shutdown_token: &CancellationToken,
    operation: &str,
    op: F,
) -> crate::error::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::error::Result<T>>,
{
    retry(policy, shutdown_token, operation, op)
        .await
        .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;

    fn unavailable() -> Error {
        Error::Rpc {
            code: 503,
            message: "unavailable".to_string(),
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 10);
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(10), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(Duration::from_millis(10), 5);
        let token = CancellationToken::new();

        let result = retry_rpc(&policy, &token, "test", || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(unavailable())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(Duration::from_millis(10), 2);
        let token = CancellationToken::new();

        let result: crate::error::Result<()> = retry_rpc(&policy, &token, "test", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(unavailable())
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(Error::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_terminal_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(Duration::from_millis(10), 5);
        let token = CancellationToken::new();

        let result: crate::error::Result<()> = retry_rpc(&policy, &token, "test", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::UnsupportedTier(300))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::UnsupportedTier(300))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_returns_cancelled_on_shutdown() {
        let policy = RetryPolicy::new(Duration::from_secs(3600), 5);
        let token = CancellationToken::new();
        token.cancel();

        let result: crate::error::Result<()> =
            retry_rpc(&policy, &token, "test", || async { Err(unavailable()) }).await;

        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
