//! Calendar-offset schedules.
//!
//! Schedules are checked on demand, not run by a timer daemon. A
//! schedule is due when it is enabled and its `run_at` has passed.
//! Rescheduling steps a fixed offset from the previous `run_at`, so a
//! late run does not reset drift.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Repeat rule applied after a schedule runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Repeat {
    /// Disable after one run
    None,
    /// Step `run_at` forward one hour
    Hourly,
    /// Step `run_at` forward one day
    Daily,
}

/// A scheduled workflow run.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct Schedule {
    /// Unique schedule id
    #[builder(default = "uuid::Uuid::new_v4().to_string()")]
    id: String,
    /// Display name
    name: String,
    /// Workflow to execute, e.g. `morning_ops`
    workflow: String,
    /// Next run time
    run_at: DateTime<Utc>,
    /// Repeat rule
    repeat: Repeat,
    /// Whether the schedule participates in due checks
    #[builder(default = "true")]
    enabled: bool,
    /// Workflow payload
    #[builder(default)]
    #[serde(default)]
    payload: serde_json::Value,
    /// When the schedule last ran
    #[builder(default)]
    #[serde(default)]
    last_run_at: Option<DateTime<Utc>>,
    /// Status of the last run (`ok`, `skipped`, `error`)
    #[builder(default)]
    #[serde(default)]
    last_run_status: Option<String>,
}

impl Schedule {
    /// Whether the schedule should run now.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.run_at <= now
    }

    /// Record a run and step the schedule per its repeat rule.
    ///
    /// The next `run_at` offsets from the previous `run_at`, not from
    /// `now`. A `Repeat::None` schedule is disabled.
    pub fn record_run(&mut self, status: impl Into<String>, now: DateTime<Utc>) {
        self.last_run_at = Some(now);
        self.last_run_status = Some(status.into());
        match self.repeat {
            Repeat::None => self.enabled = false,
            Repeat::Hourly => self.run_at += Duration::hours(1),
            Repeat::Daily => self.run_at += Duration::hours(24),
        }
    }

    /// Enable or disable the schedule.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(repeat: Repeat, run_at: DateTime<Utc>) -> Schedule {
        ScheduleBuilder::default()
            .name("morning")
            .workflow("morning_ops")
            .run_at(run_at)
            .repeat(repeat)
            .build()
            .expect("valid Schedule")
    }

    #[test]
    fn test_due_check() {
        let now = Utc::now();
        let due = sample(Repeat::Daily, now - Duration::minutes(1));
        let future = sample(Repeat::Daily, now + Duration::minutes(1));
        assert!(due.is_due(now));
        assert!(!future.is_due(now));

        let mut disabled = sample(Repeat::Daily, now - Duration::minutes(1));
        disabled.set_enabled(false);
        assert!(!disabled.is_due(now));
    }

    #[test]
    fn test_daily_steps_from_previous_run_at() {
        let t = Utc::now();
        let mut schedule = sample(Repeat::Daily, t);
        // Run three hours late; the next slot is still T + 24h.
        schedule.record_run("ok", t + Duration::hours(3));
        assert_eq!(*schedule.run_at(), t + Duration::hours(24));
        assert!(schedule.enabled());
    }

    #[test]
    fn test_hourly_steps_one_hour() {
        let t = Utc::now();
        let mut schedule = sample(Repeat::Hourly, t);
        schedule.record_run("ok", t + Duration::minutes(10));
        assert_eq!(*schedule.run_at(), t + Duration::hours(1));
    }

    #[test]
    fn test_none_disables() {
        let t = Utc::now();
        let mut schedule = sample(Repeat::None, t);
        schedule.record_run("ok", t);
        assert!(!schedule.enabled());
        assert_eq!(schedule.last_run_status().as_deref(), Some("ok"));
    }
}
