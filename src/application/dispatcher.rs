use crate::application::item_pool::ItemPool;
use crate::domain::cooldown::{CooldownGate, CooldownState};
use crate::domain::models::{ItemId, PomodoroStatus, SchedulePhase};
use crate::domain::schedule::{SchedulePolicy, ScheduleZone};
use crate::domain::selector::pick;
use crate::infrastructure::config_store::ConfigStore;
use crate::infrastructure::display::VideoDisplay;
use crate::infrastructure::notifier::Notifier;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::sync::Arc;

pub const BREAK_TITLE: &str = "Time for a break";
pub const BREAK_MESSAGE: &str = "Step away for a few minutes and enjoy a short video.";
pub const WORK_TITLE: &str = "Back to work";
pub const WORK_MESSAGE: &str = "Break is over. Time to focus.";

/// State carried from one tick to the next. Owned by the single tick loop.
pub struct TickContext {
    pub cooldown: CooldownState,
    rng: StdRng,
}

impl TickContext {
    pub fn new(rng: StdRng) -> Self {
        Self {
            cooldown: CooldownState::default(),
            rng,
        }
    }
}

impl Default for TickContext {
    fn default() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Disabled,
    Idle,
    BreakShown(ItemId),
    BreakWithoutItem,
    BreakSuppressed,
    WorkAnnounced,
    Skipped,
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Idle => f.write_str("idle"),
            Self::BreakShown(item) => write!(f, "break: showing {item}"),
            Self::BreakWithoutItem => f.write_str("break: no items available"),
            Self::BreakSuppressed => f.write_str("break: suppressed by cooldown"),
            Self::WorkAnnounced => f.write_str("work: announced"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

pub struct ActionDispatcher {
    store: Arc<dyn ConfigStore>,
    pool: ItemPool,
    display: Arc<dyn VideoDisplay>,
    notifier: Arc<dyn Notifier>,
    policy: SchedulePolicy,
    zone: ScheduleZone,
    gate: CooldownGate,
}

impl ActionDispatcher {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        pool: ItemPool,
        display: Arc<dyn VideoDisplay>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            pool,
            display,
            notifier,
            policy: SchedulePolicy::default(),
            zone: ScheduleZone::default(),
            gate: CooldownGate::default(),
        }
    }

    pub fn with_schedule(mut self, policy: SchedulePolicy, zone: ScheduleZone) -> Self {
        self.policy = policy;
        self.zone = zone;
        self
    }

    pub fn with_gate(mut self, gate: CooldownGate) -> Self {
        self.gate = gate;
        self
    }

    /// Runs one scheduling decision. Never fails: every error is logged and
    /// reflected in the returned outcome at most.
    pub async fn on_tick(&self, now: DateTime<Utc>, context: &mut TickContext) -> TickOutcome {
        let config = match self.store.load() {
            Ok(versioned) => versioned.value,
            Err(error) => {
                error!("tick at {now} skipped: failed to read config: {error}");
                return TickOutcome::Skipped;
            }
        };
        if !config.enabled {
            debug!("tick at {now}: disabled");
            return TickOutcome::Disabled;
        }

        let phase = self.zone.classify(&self.policy, now);
        let outcome = match phase {
            SchedulePhase::None => TickOutcome::Idle,
            SchedulePhase::BreakTime => {
                if !self.gate.should_act(phase, now, &context.cooldown) {
                    debug!("break at {now} suppressed by cooldown");
                    return TickOutcome::BreakSuppressed;
                }
                context.cooldown.record(now);
                self.save_status(PomodoroStatus::BreakTime);

                let mut playlists = config.playlists;
                let pool = self.pool.get_pool(&mut playlists).await;
                match pick(&pool, &mut context.rng) {
                    Some(item) => {
                        self.show(&item);
                        self.notify(BREAK_TITLE, BREAK_MESSAGE);
                        TickOutcome::BreakShown(item)
                    }
                    None => {
                        warn!("break time but no items available");
                        TickOutcome::BreakWithoutItem
                    }
                }
            }
            SchedulePhase::WorkTime => {
                self.save_status(PomodoroStatus::FocusTime);
                self.notify(WORK_TITLE, WORK_MESSAGE);
                TickOutcome::WorkAnnounced
            }
        };

        if outcome != TickOutcome::Idle {
            info!("tick at {now}: {outcome}");
        }
        outcome
    }

    /// Displays a random item immediately, bypassing schedule and cooldown.
    pub async fn show_random_now(&self, rng: &mut StdRng) -> Option<ItemId> {
        let mut playlists = match self.store.load() {
            Ok(versioned) => versioned.value.playlists,
            Err(error) => {
                error!("failed to read config: {error}");
                return None;
            }
        };
        let pool = self.pool.get_pool(&mut playlists).await;
        let item = pick(&pool, rng)?;
        self.show(&item);
        Some(item)
    }

    fn show(&self, item: &ItemId) {
        if let Err(error) = self.display.show(item) {
            warn!("{error}");
        }
    }

    fn notify(&self, title: &str, message: &str) {
        if let Err(error) = self.notifier.notify(title, message) {
            warn!("{error}");
        }
    }

    fn save_status(&self, status: PomodoroStatus) {
        if let Err(error) = self.store.save_status(status) {
            warn!("failed to save pomodoro status: {error}");
        }
    }
}
