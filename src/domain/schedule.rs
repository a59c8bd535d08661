use crate::domain::models::SchedulePhase;
use chrono::{DateTime, Local, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BREAK_MINUTES: [u32; 2] = [25, 55];
pub const DEFAULT_WORK_MINUTES: [u32; 2] = [0, 30];

/// Minutes of the hour at which break and work boundaries fall.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePolicy {
    pub break_minutes: Vec<u32>,
    pub work_minutes: Vec<u32>,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            break_minutes: DEFAULT_BREAK_MINUTES.to_vec(),
            work_minutes: DEFAULT_WORK_MINUTES.to_vec(),
        }
    }
}

impl SchedulePolicy {
    pub fn validate(&self) -> Result<(), String> {
        for minute in self.break_minutes.iter().chain(&self.work_minutes) {
            if *minute >= 60 {
                return Err(format!("schedule minute {minute} must be < 60"));
            }
        }
        if let Some(shared) = self
            .break_minutes
            .iter()
            .find(|minute| self.work_minutes.contains(minute))
        {
            return Err(format!("minute {shared} is both a break and a work boundary"));
        }
        Ok(())
    }

    pub fn classify_minute(&self, minute: u32) -> SchedulePhase {
        if self.break_minutes.contains(&minute) {
            SchedulePhase::BreakTime
        } else if self.work_minutes.contains(&minute) {
            SchedulePhase::WorkTime
        } else {
            SchedulePhase::None
        }
    }

    pub fn classify<Z: TimeZone>(&self, instant: &DateTime<Z>) -> SchedulePhase {
        self.classify_minute(instant.minute())
    }
}

/// Classifies an instant with the default half-hour pomodoro boundaries.
pub fn classify<Z: TimeZone>(instant: &DateTime<Z>) -> SchedulePhase {
    SchedulePolicy::default().classify(instant)
}

/// Time zone in which minute-of-hour is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleZone {
    #[default]
    Local,
    Named(Tz),
}

impl ScheduleZone {
    pub fn parse(name: Option<&str>) -> Result<Self, String> {
        match name.map(str::trim).filter(|value| !value.is_empty()) {
            None => Ok(Self::Local),
            Some(value) => value
                .parse::<Tz>()
                .map(Self::Named)
                .map_err(|error| format!("unknown timezone '{value}': {error}")),
        }
    }

    pub fn minute_of_hour(&self, now: DateTime<Utc>) -> u32 {
        match self {
            Self::Local => now.with_timezone(&Local).minute(),
            Self::Named(tz) => now.with_timezone(tz).minute(),
        }
    }

    pub fn classify(&self, policy: &SchedulePolicy, now: DateTime<Utc>) -> SchedulePhase {
        policy.classify_minute(self.minute_of_hour(now))
    }
}
