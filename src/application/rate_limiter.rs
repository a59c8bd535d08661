use log::debug;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Spaces outbound API calls at least `min_interval` apart. Share one
/// instance behind an `Arc`; the lock is held across the wait, so concurrent
/// callers queue up instead of racing past the interval.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub async fn throttle(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = Instant::now().saturating_duration_since(previous);
            if let Some(wait) = self.min_interval.checked_sub(elapsed).filter(|wait| !wait.is_zero()) {
                debug!("rate limited; waiting {}ms", wait.as_millis());
                sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
