//! Daily upload schedule: on/off plus a time of day.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, BatchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_hour() -> u32 {
    12
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            hour: default_hour(),
            minute: 0,
        }
    }
}

impl ScheduleState {
    pub fn new(enabled: bool, hour: u32, minute: u32) -> BatchResult<Self> {
        let state = Self { enabled, hour, minute };
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> BatchResult<()> {
        if self.hour > 23 {
            return Err(BatchError::InvalidSchedule(format!("hour {} is not in 0-23", self.hour)));
        }
        if self.minute > 59 {
            return Err(BatchError::InvalidSchedule(format!("minute {} is not in 0-59", self.minute)));
        }
        Ok(())
    }

    /// Whether the wall clock is inside the configured minute.
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        self.enabled && now.hour() == self.hour && now.minute() == self.minute
    }

    /// Whether a tick at `now` should start a cycle, given when the loop last fired.
    ///
    /// Fires at most once per configured minute.
    pub fn is_due(&self, now: NaiveDateTime, last_fired: Option<NaiveDateTime>) -> bool {
        if !self.matches(now) {
            return false;
        }
        match last_fired {
            Some(last) => truncate_to_minute(last) != truncate_to_minute(now),
            None => true,
        }
    }

    /// The next time this schedule fires strictly after `now`, or `None` when disabled.
    pub fn next_run(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.enabled {
            return None;
        }
        let today = now.date().and_hms_opt(self.hour, self.minute, 0)?;
        if today > now {
            Some(today)
        } else {
            Some(today + Duration::days(1))
        }
    }

    pub fn time_label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn rejects_out_of_range_times() {
        assert!(ScheduleState::new(true, 24, 0).is_err());
        assert!(ScheduleState::new(true, 0, 60).is_err());
        assert!(ScheduleState::new(false, 23, 59).is_ok());
    }

    #[test]
    fn fires_once_per_configured_minute() {
        let s = ScheduleState::new(true, 9, 30).unwrap();
        assert!(!s.is_due(at(9, 29, 59), None));
        assert!(s.is_due(at(9, 30, 0), None));
        assert!(!s.is_due(at(9, 30, 40), Some(at(9, 30, 0))));
        assert!(s.is_due(at(9, 30, 10), Some(at(9, 30, 0) - Duration::days(1))));
    }

    #[test]
    fn disabled_never_fires() {
        let s = ScheduleState::new(false, 9, 30).unwrap();
        assert!(!s.is_due(at(9, 30, 0), None));
        assert_eq!(s.next_run(at(8, 0, 0)), None);
    }

    #[test]
    fn next_run_rolls_over_to_tomorrow() {
        let s = ScheduleState::default();
        assert_eq!(s.next_run(at(11, 0, 0)), Some(at(12, 0, 0)));
        assert_eq!(s.next_run(at(12, 0, 0)), Some(at(12, 0, 0) + Duration::days(1)));
    }

    #[test]
    fn absent_fields_take_defaults() {
        let s: ScheduleState = serde_json::from_str(r#"{"minute": 15}"#).unwrap();
        assert!(s.enabled);
        assert_eq!(s.time_label(), "12:15");
    }
}
