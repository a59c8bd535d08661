use crate::application::dispatcher::{ActionDispatcher, TickContext, TickOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[async_trait]
pub trait TickHandler: Send + Sync {
    async fn on_tick(&self, now: DateTime<Utc>, context: &mut TickContext) -> TickOutcome;
}

#[async_trait]
impl TickHandler for ActionDispatcher {
    async fn on_tick(&self, now: DateTime<Utc>, context: &mut TickContext) -> TickOutcome {
        ActionDispatcher::on_tick(self, now, context).await
    }
}

/// Delivers at most one tick per wall-clock minute. The wall clock is polled
/// rather than trusting a monotonic interval, so ticking resumes on the
/// current minute after the host sleeps.
pub struct TickScheduler {
    handler: Arc<dyn TickHandler>,
    poll_interval: Duration,
    clock: Clock,
}

impl TickScheduler {
    pub fn new(handler: Arc<dyn TickHandler>) -> Self {
        Self {
            handler,
            poll_interval: DEFAULT_POLL_INTERVAL,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(10));
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Runs until `shutdown` carries `true` or its sender is dropped.
    /// Returns the number of ticks delivered.
    pub async fn run(self, mut context: TickContext, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(
            "scheduler started (polling every {}s)",
            self.poll_interval.as_secs_f32()
        );
        let mut last_minute = None;
        let mut ticks = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = (self.clock)();
            let minute = now.timestamp().div_euclid(60);
            if last_minute != Some(minute) {
                last_minute = Some(minute);
                let outcome = self.handler.on_tick(now, &mut context).await;
                debug!("tick {} delivered: {outcome}", ticks + 1);
                ticks += 1;
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("scheduler stopped after {ticks} tick(s)");
        ticks
    }
}
