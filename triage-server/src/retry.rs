//! Retry with backoff for the external stores
//!
//! Each store gets its own [`RetryPolicy`] instance. Errors decide for
//! themselves whether they are worth retrying via [`Retryable`]; the policy
//! only decides how long to wait and when to give up. Exhausting a policy
//! returns the last error unchanged.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Transient/fatal classification for errors coming out of a store
pub trait Retryable {
    /// Throttling, transient unavailability or timeout
    fn is_retryable(&self) -> bool;

    /// Server-supplied wait hint (HTTP `retry-after`)
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Backoff {
    /// base * 2^retry, capped at max
    Exponential { base: Duration, max: Duration },
    /// Fixed delays; the last entry repeats
    Ladder(Vec<Duration>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    name: &'static str,
    max_attempts: u32,
    backoff: Backoff,
    honor_retry_after: bool,
    max_total_wait: Option<Duration>,
}

impl RetryPolicy {
    /// Exponential policy: `max_attempts` includes the first try
    pub fn exponential(
        name: &'static str,
        max_attempts: u32,
        base: Duration,
        max: Duration,
    ) -> Self {
        Self {
            name,
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential { base, max },
            honor_retry_after: false,
            max_total_wait: None,
        }
    }

    /// Content store (S3)
    pub fn content_store() -> Self {
        Self::exponential(
            "content_store",
            4,
            Duration::from_millis(200),
            Duration::from_secs(5),
        )
    }

    /// Metadata store (PostgreSQL)
    pub fn metadata_store() -> Self {
        Self::exponential(
            "metadata_store",
            3,
            Duration::from_millis(100),
            Duration::from_secs(2),
        )
    }

    /// Content-analysis API: longer ladder, honors `retry-after`, bounded
    /// total wait
    pub fn content_analysis() -> Self {
        Self {
            name: "content_analysis",
            max_attempts: 5,
            backoff: Backoff::Ladder(
                [2, 4, 8, 16].into_iter().map(Duration::from_secs).collect(),
            ),
            honor_retry_after: true,
            max_total_wait: Some(Duration::from_secs(60)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (0 = after the first failure)
    pub fn delay_for(&self, retry: u32) -> Duration {
        match &self.backoff {
            Backoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(retry);
                base.saturating_mul(factor).min(*max)
            }
            Backoff::Ladder(steps) => steps
                .get(retry as usize)
                .or(steps.last())
                .copied()
                .unwrap_or_default(),
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// policy is exhausted.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 1;
        let mut waited = Duration::ZERO;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if attempt >= self.max_attempts {
                tracing::warn!(
                    policy = self.name,
                    operation,
                    attempts = attempt,
                    error = %err,
                    "Retry attempts exhausted"
                );
                return Err(err);
            }

            let mut delay = self.delay_for(attempt - 1);
            if self.honor_retry_after
                && let Some(hint) = err.retry_after()
            {
                delay = hint;
            }

            if let Some(budget) = self.max_total_wait
                && waited + delay > budget
            {
                tracing::warn!(
                    policy = self.name,
                    operation,
                    attempts = attempt,
                    waited_ms = waited.as_millis() as u64,
                    error = %err,
                    "Retry wait budget exhausted"
                );
                return Err(err);
            }

            tracing::debug!(
                policy = self.name,
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after transient error"
            );
            tokio::time::sleep(delay).await;
            waited += delay;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        Transient,
        RateLimited(Duration),
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            !matches!(self, TestError::Fatal)
        }

        fn retry_after(&self) -> Option<Duration> {
            match self {
                TestError::RateLimited(d) => Some(*d),
                _ => None,
            }
        }
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::content_store();
        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for(2), Duration::from_millis(800));
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn test_ladder_repeats_last_step() {
        let policy = RetryPolicy::content_analysis();
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(16));
        assert_eq!(policy.delay_for(7), Duration::from_secs(16));
    }

    #[test]
    fn test_store_policies_are_independent() {
        assert_ne!(RetryPolicy::content_store(), RetryPolicy::metadata_store());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::content_store()
            .run("copy", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError::Transient)
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::content_store()
            .run("copy", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Fatal) }
            })
            .await;

        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::metadata_store();
        let result: Result<(), _> = policy
            .run("update", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            })
            .await;

        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(calls.load(Ordering::SeqCst), policy.max_attempts());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_honored_within_budget() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result: Result<(), _> = RetryPolicy::content_analysis()
            .run("analyze", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::RateLimited(Duration::from_secs(40))) }
            })
            .await;

        // 40s fits the 60s budget once; a second 40s wait would not.
        assert!(matches!(result, Err(TestError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(40) && elapsed < Duration::from_secs(41));
    }
}
