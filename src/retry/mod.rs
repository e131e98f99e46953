//! Retry wrapper for transient database connection failures
//!
//! Implements exponential backoff with jitter around persistence calls.
//! Transient errors (broken connections, pool timeouts) are retried up to a
//! configured budget; everything else propagates on the first attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Retry configuration for persistence operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts
    pub max_delay: Duration,
    /// Factor applied to the delay after each retry
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
            backoff_multiplier: 2.0,
        }
    }
}

/// Error returned by [`with_retry`]
#[derive(Error, Debug)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Every attempt failed with a transient connection error.
    ///
    /// Surfaced to clients as a retry-later condition, distinct from
    /// permanent business-rule rejections.
    #[error("database connection failed after {attempts} attempts: {source}")]
    ConnectionExhausted { attempts: u32, source: E },

    /// The operation failed with a non-transient error; it was invoked
    /// exactly once and the error is passed through unmodified.
    #[error("{0}")]
    Operation(E),
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// The underlying error, regardless of how the retry loop ended.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::ConnectionExhausted { source, .. } => source,
            RetryError::Operation(e) => e,
        }
    }
}

/// Classifies which errors the retry loop is allowed to swallow
pub trait TransientError {
    fn is_transient(&self) -> bool;
}

impl TransientError for sqlx::Error {
    fn is_transient(&self) -> bool {
        match self {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
            other => {
                let message = other.to_string().to_lowercase();
                message.contains("cannot reach database server")
                    || message.contains("connection refused")
            }
        }
    }
}

/// Retry `operation` with exponential backoff, classifying errors via
/// [`TransientError`].
///
/// The operation is invoked at most `max_retries + 1` times. A success is
/// returned as-is, so callers cannot distinguish a first-attempt success
/// from a retried one.
pub async fn with_retry<T, E, Fut, Op>(
    policy: &RetryPolicy,
    operation: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: TransientError + std::error::Error + 'static,
{
    with_retry_classified(policy, E::is_transient, operation).await
}

/// Retry `operation` with exponential backoff using a caller-supplied
/// transient-error classifier.
///
/// Keeping the classifier injectable decouples the backoff loop from any
/// particular persistence backend's error surface.
pub async fn with_retry_classified<T, E, Fut, Op, C>(
    policy: &RetryPolicy,
    classify: C,
    mut operation: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::error::Error + 'static,
{
    let mut delay = policy.initial_delay;

    for attempt in 0..=policy.max_retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !classify(&err) => return Err(RetryError::Operation(err)),
            Err(err) if attempt == policy.max_retries => {
                return Err(RetryError::ConnectionExhausted {
                    attempts: attempt + 1,
                    source: err,
                });
            }
            Err(err) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient database error, retrying"
                );

                tokio::time::sleep(jittered(delay)).await;
                delay = next_delay(delay, policy);
            }
        }
    }

    unreachable!("retry loop returns from its final attempt")
}

/// Add 0-30% random jitter so concurrent callers don't retry in lockstep
fn jittered(delay: Duration) -> Duration {
    let jitter = rand::thread_rng().gen_range(0.0..0.3);
    delay.mul_f64(1.0 + jitter)
}

fn next_delay(delay: Duration, policy: &RetryPolicy) -> Duration {
    delay.mul_f64(policy.backoff_multiplier).min(policy.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use thiserror::Error;

    #[derive(Error, Debug, PartialEq)]
    enum TestError {
        #[error("cannot reach database server")]
        Transient,
        #[error("row not found")]
        Permanent,
    }

    impl TransientError for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = with_retry(&RetryPolicy::default(), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_error_propagates_immediately() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = with_retry(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Permanent) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Operation(_)));
        assert_eq!(err.into_inner(), TestError::Permanent);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_attempt_count() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = with_retry(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Transient) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result.unwrap_err() {
            RetryError::ConnectionExhausted { attempts, source } => {
                assert_eq!(attempts, 4);
                assert_eq!(source, TestError::Transient);
            }
            other => panic!("expected ConnectionExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Transient) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result.unwrap_err(),
            RetryError::ConnectionExhausted { attempts: 1, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_classifier_overrides_default() {
        let calls = AtomicU32::new(0);

        // Treat everything as permanent: even the transient variant must
        // propagate on the first attempt.
        let result: Result<u32, _> = with_retry_classified(
            &RetryPolicy::default(),
            |_: &TestError| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result.unwrap_err(), RetryError::Operation(_)));
    }

    #[test]
    fn delay_progression_is_capped() {
        let policy = RetryPolicy::default();
        let mut delay = policy.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(delay.as_millis());
            delay = next_delay(delay, &policy);
        }
        assert_eq!(seen, vec![100, 200, 400, 800, 1600, 3200, 5000, 5000]);
    }

    #[test]
    fn sqlx_row_not_found_is_not_transient() {
        assert!(!sqlx::Error::RowNotFound.is_transient());
    }

    #[test]
    fn sqlx_io_error_is_transient() {
        let err = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(err.is_transient());
    }
}
