//! Schedule management and the due-schedule runner.

use crate::engine::OpsEngine;
use crate::morning::MorningRunInput;
use chrono::{DateTime, Utc};
use opsgate_core::{Identity, OpsAction, Schedule, WorkspaceName};
use opsgate_error::{NotFoundError, OpsgateResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

/// Result of one schedule attempted by the due runner.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct ScheduleJobResult {
    /// Schedule id
    schedule_id: String,
    /// Schedule name
    name: String,
    /// Workflow that was dispatched
    workflow: String,
    /// `ok`, `skipped`, or `error`
    status: String,
    /// Error or skip detail
    #[serde(default)]
    detail: Option<String>,
}

impl OpsEngine {
    /// Insert or replace a schedule.
    pub fn upsert_schedule(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        schedule: Schedule,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Schedule> {
        self.authorize(workspace, OpsAction::Write, identity)?;
        let schedule = self.store().upsert_schedule(workspace, schedule)?;
        self.audit(
            workspace,
            identity,
            "schedules.upsert",
            json!({"schedule_id": schedule.id(), "workflow": schedule.workflow()}),
            now,
        )?;
        Ok(schedule)
    }

    /// Enable or disable a schedule by id.
    pub fn set_schedule_enabled(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        id: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Schedule> {
        self.authorize(workspace, OpsAction::Write, identity)?;
        let mut schedules = self.store().schedules(workspace)?;
        let schedule = schedules
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| NotFoundError::new(format!("schedule '{}' not found", id)))?;
        schedule.set_enabled(enabled);
        let updated = schedule.clone();
        self.store().save_schedules(workspace, &schedules)?;
        self.audit(
            workspace,
            identity,
            "schedules.enable",
            json!({"schedule_id": id, "enabled": enabled}),
            now,
        )?;
        Ok(updated)
    }

    /// Run every due schedule.
    ///
    /// Each job is attempted independently; a failing job is recorded
    /// as `error` and does not block the rest of the batch. Every
    /// attempted schedule steps per its repeat rule, so a failing
    /// daily job retries tomorrow rather than hot-looping.
    #[instrument(skip(self, identity), fields(workspace = %workspace))]
    pub fn run_due_schedules(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Vec<ScheduleJobResult>> {
        self.authorize(workspace, OpsAction::Execute, identity)?;

        let mut schedules = self.store().schedules(workspace)?;
        let mut results = Vec::new();
        for schedule in schedules.iter_mut() {
            if !schedule.is_due(now) {
                continue;
            }
            let (status, detail) = self.dispatch_workflow(workspace, identity, schedule, now);
            schedule.record_run(status.clone(), now);
            results.push(ScheduleJobResult {
                schedule_id: schedule.id().clone(),
                name: schedule.name().clone(),
                workflow: schedule.workflow().clone(),
                status,
                detail,
            });
        }

        if !results.is_empty() {
            self.store().save_schedules(workspace, &schedules)?;
            self.audit(
                workspace,
                identity,
                "schedules.run_due",
                serde_json::to_value(&results).unwrap_or(serde_json::Value::Null),
                now,
            )?;
        }
        info!(ran = results.len(), "Due schedules processed");
        Ok(results)
    }

    fn dispatch_workflow(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        schedule: &Schedule,
        now: DateTime<Utc>,
    ) -> (String, Option<String>) {
        match schedule.workflow().as_str() {
            "morning_ops" => {
                // Scheduled runs force past the per-day guard so a
                // manual run earlier in the day cannot starve them.
                let mut input: MorningRunInput =
                    serde_json::from_value(schedule.payload().clone()).unwrap_or_default();
                input.force = true;
                match self.morning_run(workspace, identity, input, now) {
                    Ok(report) if *report.executed() => ("ok".to_string(), None),
                    Ok(_) => ("skipped".to_string(), None),
                    Err(e) => {
                        warn!(schedule_id = %schedule.id(), error = %e, "Scheduled workflow failed");
                        ("error".to_string(), Some(e.to_string()))
                    }
                }
            }
            other => (
                "error".to_string(),
                Some(format!("unknown workflow '{}'", other)),
            ),
        }
    }
}
