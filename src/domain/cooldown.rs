use crate::domain::models::SchedulePhase;
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_BREAK_COOLDOWN_MINUTES: i64 = 5;

/// When the last break action ran. Lives only as long as the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownState {
    last_action: Option<DateTime<Utc>>,
}

impl CooldownState {
    pub fn last_action(&self) -> Option<DateTime<Utc>> {
        self.last_action
    }

    /// Records an action at `now`. Older timestamps are ignored.
    pub fn record(&mut self, now: DateTime<Utc>) {
        match self.last_action {
            Some(previous) if previous >= now => {}
            _ => self.last_action = Some(now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownGate {
    break_cooldown: Duration,
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_BREAK_COOLDOWN_MINUTES))
    }
}

impl CooldownGate {
    pub fn new(break_cooldown: Duration) -> Self {
        Self {
            break_cooldown: break_cooldown.max(Duration::zero()),
        }
    }

    pub fn should_act(&self, phase: SchedulePhase, now: DateTime<Utc>, cooldown: &CooldownState) -> bool {
        match phase {
            SchedulePhase::None => false,
            SchedulePhase::WorkTime => true,
            SchedulePhase::BreakTime => match cooldown.last_action {
                None => true,
                Some(last) => now - last >= self.break_cooldown,
            },
        }
    }
}
