//! Per-workspace engine state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// State document rolled forward by the workflow engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceState {
    /// Day stamp of the last morning run, used for per-day idempotency
    #[serde(default)]
    pub last_morning_run_date: Option<NaiveDate>,
    /// Day stamps of recent morning runs, newest last
    #[serde(default)]
    pub morning_run_history: Vec<NaiveDate>,
}

impl WorkspaceState {
    /// How many day stamps the history retains.
    const HISTORY_LIMIT: usize = 30;

    /// Whether a morning run already happened on `day`.
    pub fn ran_on(&self, day: NaiveDate) -> bool {
        self.last_morning_run_date == Some(day)
    }

    /// Roll the day stamp and history forward.
    pub fn record_morning_run(&mut self, day: NaiveDate) {
        self.last_morning_run_date = Some(day);
        if self.morning_run_history.last() != Some(&day) {
            self.morning_run_history.push(day);
        }
        if self.morning_run_history.len() > Self::HISTORY_LIMIT {
            let excess = self.morning_run_history.len() - Self::HISTORY_LIMIT;
            self.morning_run_history.drain(..excess);
        }
    }
}
