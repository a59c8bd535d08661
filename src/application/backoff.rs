use crate::infrastructure::config::RetrySettings;
use crate::infrastructure::error::FetchError;
use async_trait::async_trait;
use log::warn;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows the failed attempt `attempt_index` (0-based).
    pub fn delay_after(&self, attempt_index: u8) -> Duration {
        let factor = 2u32.saturating_pow(u32::from(attempt_index));
        self.base_delay.saturating_mul(factor)
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` attempts have failed.
pub async fn fetch_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u8 = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_retryable() => return Err(error),
            Err(error) if attempt + 1 < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "attempt {}/{} failed: {error}; retrying in {}ms",
                    attempt + 1,
                    max_attempts,
                    delay.as_millis()
                );
                sleeper.sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
            Err(error) => {
                return Err(FetchError::Exhausted {
                    attempts: max_attempts,
                    last: Box::new(error),
                });
            }
        }
    }
}
