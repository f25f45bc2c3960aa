// SPDX-License-Identifier: MPL-2.0
//! Bounded retry with exponential backoff around a module factory.
//!
//! The loader owns retry decisions: transient failures are retried after
//! `base_delay × 2^n` and only the last error of an exhausted budget is
//! returned. It knows nothing about sharing; deduplication of concurrent
//! loads is the cache's job.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::factory::ModuleFactory;
use crate::domain::loader::{BaseDelay, RetryCount};
use crate::error::ModuleError;

/// Retry budget and backoff unit for one factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub retries: RetryCount,
    pub base_delay: BaseDelay,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(retries: u32, base_delay_ms: u64) -> Self {
        Self {
            retries: RetryCount::new(retries),
            base_delay: BaseDelay::from_millis(base_delay_ms),
        }
    }

    /// Single attempt, no backoff.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            retries: RetryCount::new(0),
            ..Self::default()
        }
    }

    /// Wait before the given attempt fails over to the next one, or `None`
    /// when `attempt` (1-based) was the last allowed.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.retries.max_attempts())
            .then(|| self.base_delay.backoff_for(attempt.saturating_sub(1)))
    }
}

/// Progress notification emitted by [`RetryableLoader::load`].
#[derive(Debug, Clone, Copy)]
pub enum AttemptEvent<'a> {
    Started {
        attempt: u32,
    },
    Succeeded {
        attempt: u32,
    },
    /// `retry_in` is `None` when the budget is exhausted.
    Failed {
        attempt: u32,
        error: &'a ModuleError,
        retry_in: Option<Duration>,
    },
}

type AttemptHook = Arc<dyn Fn(&AttemptEvent<'_>) + Send + Sync>;

/// Factory wrapper that retries transient failures.
pub struct RetryableLoader<M> {
    factory: ModuleFactory<M>,
    policy: RetryPolicy,
    hooks: Vec<AttemptHook>,
}

impl<M: Send + 'static> RetryableLoader<M> {
    pub fn new(factory: ModuleFactory<M>, policy: RetryPolicy) -> Self {
        Self {
            factory,
            policy,
            hooks: Vec::new(),
        }
    }

    /// Registers a hook called synchronously on every attempt transition.
    #[must_use]
    pub fn with_hook(mut self, hook: impl Fn(&AttemptEvent<'_>) + Send + Sync + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Runs the attempt sequence to completion.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt once `retries + 1` attempts
    /// have failed.
    pub async fn load(&self) -> Result<M, ModuleError> {
        let id = self.factory.id();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.emit(&AttemptEvent::Started { attempt });

            match self.factory.invoke().await {
                Ok(module) => {
                    debug!(module = %id, attempt, "module loaded");
                    self.emit(&AttemptEvent::Succeeded { attempt });
                    return Ok(module);
                }
                Err(error) => {
                    let retry_in = self.policy.delay_after(attempt);
                    self.emit(&AttemptEvent::Failed {
                        attempt,
                        error: &error,
                        retry_in,
                    });

                    let Some(delay) = retry_in else {
                        warn!(
                            module = %id,
                            attempts = attempt,
                            %error,
                            "module load failed, giving up"
                        );
                        return Err(error);
                    };
                    debug!(
                        module = %id,
                        attempt,
                        %error,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "module load failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl<M> RetryableLoader<M> {
    #[must_use]
    pub fn factory(&self) -> &ModuleFactory<M> {
        &self.factory
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn emit(&self, event: &AttemptEvent<'_>) {
        for hook in &self.hooks {
            hook(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Factory failing `failures` times before yielding `value`.
    fn flaky(failures: u32, value: u32) -> (ModuleFactory<u32>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let factory = ModuleFactory::new(move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call <= failures {
                    Err(ModuleError::new(format!("network error #{call}")))
                } else {
                    Ok(value)
                }
            }
        });
        (factory, calls)
    }

    #[test]
    fn delay_after_follows_budget() {
        let policy = RetryPolicy::new(3, 1000);
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay_after(3), Some(Duration::from_millis(4000)));
        assert_eq!(policy.delay_after(4), None);
        assert_eq!(RetryPolicy::no_retry().delay_after(1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retry() {
        let (factory, calls) = flaky(0, 7);
        let loader = RetryableLoader::new(factory, RetryPolicy::default());
        let start = Instant::now();

        assert_eq!(loader.load().await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_factory_is_invoked_retries_plus_one_times() {
        let (factory, calls) = flaky(u32::MAX, 0);
        let loader = RetryableLoader::new(factory, RetryPolicy::new(2, 10));

        let err = loader.load().await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Last observed error is propagated
        assert_eq!(err.message(), "network error #3");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt_without_wait() {
        let (factory, calls) = flaky(u32::MAX, 0);
        let loader = RetryableLoader::new(factory, RetryPolicy::no_retry());
        let start = Instant::now();

        assert!(loader.load().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_between_attempts() {
        let (factory, _calls) = flaky(u32::MAX, 0);
        let started_at = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&started_at);
        let loader = RetryableLoader::new(factory, RetryPolicy::new(3, 1000)).with_hook(
            move |event| {
                if let AttemptEvent::Started { .. } = event {
                    log.lock().unwrap().push(Instant::now());
                }
            },
        );

        let _ = loader.load().await;

        let times = started_at.lock().unwrap();
        assert_eq!(times.len(), 4);
        let gaps: Vec<_> = times.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps[0] >= Duration::from_millis(1000));
        assert!(gaps[1] >= Duration::from_millis(2000));
        assert!(gaps[2] >= Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let (factory, calls) = flaky(2, 99);
        let loader = RetryableLoader::new(factory, RetryPolicy::new(3, 1000));
        let start = Instant::now();

        assert_eq!(loader.load().await.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn large_retry_budget_is_fully_used() {
        for retries in [11, 15, 25] {
            let (factory, calls) = flaky(u32::MAX, 0);
            let loader = RetryableLoader::new(factory, RetryPolicy::new(retries, 1));

            assert!(loader.load().await.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), retries + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn long_base_delay_is_not_shortened() {
        let (factory, calls) = flaky(1, 5);
        let loader = RetryableLoader::new(factory, RetryPolicy::new(1, 120_000));
        let start = Instant::now();

        assert_eq!(loader.load().await.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(120));
    }

    #[test]
    fn delay_after_grows_past_a_minute() {
        let policy = RetryPolicy::new(2, 120_000);
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(120)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(240)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[tokio::test(start_paused = true)]
    async fn hook_sees_exhaustion() {
        let (factory, _calls) = flaky(u32::MAX, 0);
        let exhausted = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&exhausted);
        let loader = RetryableLoader::new(factory, RetryPolicy::new(1, 5)).with_hook(
            move |event| {
                if let AttemptEvent::Failed { retry_in: None, attempt, .. } = event {
                    seen.store(*attempt, Ordering::SeqCst);
                }
            },
        );

        let _ = loader.load().await;
        assert_eq!(exhausted.load(Ordering::SeqCst), 2);
    }
}
