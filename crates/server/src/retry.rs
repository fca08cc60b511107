//! Bounded retry for transient failures.
//!
//! Only timeout-class errors are retried; anything else is a real problem
//! and propagates immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Classification of an error as timeout-class (transient) or not.
///
/// Implemented by error types whose operations may be wrapped in
/// [`execute_with_retry`].
pub trait Transient {
    /// Whether this error indicates a connection/operation timeout.
    fn is_timeout(&self) -> bool;
}

/// How many times to call an operation and how long to wait between calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of calls, including the first attempt.
    pub max_calls: u32,
    /// Delay before each retry (not before the first attempt).
    pub delay: Duration,
}

/// Terminal outcome of a retried operation that never succeeded.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// A non-timeout error; propagated on the attempt it occurred, with no
    /// further retries.
    #[error("{0}")]
    Fatal(E),

    /// Every allowed attempt timed out. Distinct from the underlying cause,
    /// which is carried for logging.
    #[error("retry attempts exceeded after {attempts} calls: {last}")]
    Exhausted {
        /// Number of calls made.
        attempts: u32,
        /// The timeout error from the final attempt.
        last: E,
    },
}

/// Invoke `op` up to `policy.max_calls` times, sleeping `policy.delay`
/// before each retry.
///
/// A `max_calls` of zero is treated as one call.
///
/// # Errors
///
/// Returns [`RetryError::Fatal`] as soon as `op` fails with a non-timeout
/// error, or [`RetryError::Exhausted`] once all calls have timed out.
pub async fn execute_with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let max_calls = policy.max_calls.max(1);
    let mut last = None;

    for attempt in 1..=max_calls {
        if attempt > 1 {
            tokio::time::sleep(policy.delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_timeout() => {
                tracing::warn!(
                    attempt,
                    max_calls,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "timeout-class failure, retrying"
                );
                last = Some(e);
            }
            Err(e) => return Err(RetryError::Fatal(e)),
        }
    }

    // `last` is always set here: the loop runs at least once and only
    // falls through on a timeout-class error.
    match last {
        Some(last) => Err(RetryError::Exhausted {
            attempts: max_calls,
            last,
        }),
        None => unreachable!("retry loop exited without recording an error"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, Error)]
    enum FakeError {
        #[error("connect ETIMEDOUT")]
        Timeout,
        #[error("mailbox unavailable")]
        Permanent,
    }

    impl Transient for FakeError {
        fn is_timeout(&self) -> bool {
            matches!(self, Self::Timeout)
        }
    }

    const POLICY: RetryPolicy = RetryPolicy {
        max_calls: 3,
        delay: Duration::from_secs(3),
    };

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_timeouts() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result = execute_with_retry(POLICY, || {
            let calls = Arc::clone(&calls);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FakeError::Timeout)
                } else {
                    Ok(42_u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Delay waited before the 2nd and 3rd calls only.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_timeout_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result: Result<u32, _> = execute_with_retry(POLICY, || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Permanent)
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_distinct_error() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32, _> = execute_with_retry(POLICY, || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Timeout)
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_is_immediate() {
        let started = tokio::time::Instant::now();

        let result = execute_with_retry(POLICY, || async { Ok::<_, FakeError>(()) }).await;

        assert!(result.is_ok());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
