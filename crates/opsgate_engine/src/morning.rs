//! The morning ops run.
//!
//! Idempotent per day per workspace: a second non-forced run on the
//! same UTC day is skipped without touching any document. A forced
//! run (operator retry, scheduled run) executes regardless.

use crate::engine::OpsEngine;
use chrono::{DateTime, NaiveDate, Utc};
use opsgate_core::{
    AlertSeverity, Identity, NewAlertBuilder, NewApprovalBuilder, OpsAction, Outcome,
    WorkspaceName,
};
use opsgate_error::{OpsgateResult, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

/// Token categories the morning run checks for presence.
const REQUIRED_TOKENS: [&str; 3] = ["meta_ads", "google_ads", "whatsapp"];

/// Input for a morning run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MorningRunInput {
    /// Observed spend for the day, when the caller has it
    #[serde(default)]
    pub spend: Option<f64>,
    /// Run even if a run already happened today
    #[serde(default)]
    pub force: bool,
}

/// Report of one morning run.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct MorningRunReport {
    /// Whether the run executed (`false` means skipped as duplicate)
    executed: bool,
    /// UTC day stamp of the run
    date: NaiveDate,
    /// Alert ids raised by this run
    alerts_raised: Vec<String>,
    /// Approval ids opened by this run
    approvals_opened: Vec<String>,
    /// Leads flagged as needing follow-up
    leads_flagged: Vec<String>,
}

impl MorningRunReport {
    fn skipped(date: NaiveDate) -> Self {
        Self {
            executed: false,
            date,
            alerts_raised: Vec::new(),
            approvals_opened: Vec::new(),
            leads_flagged: Vec::new(),
        }
    }
}

impl OpsEngine {
    /// Execute the morning ops run.
    ///
    /// Steps, in order: missing-token alerts for every configured
    /// connector category, the overspend check against the ops
    /// policy, and the lead follow-up sweep. One outcome record and
    /// one audit entry are appended per executed run; a skipped run
    /// appends nothing.
    #[instrument(skip(self, identity, input), fields(workspace = %workspace, force = input.force))]
    pub fn morning_run(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        input: MorningRunInput,
        now: DateTime<Utc>,
    ) -> OpsgateResult<MorningRunReport> {
        self.authorize(workspace, OpsAction::Execute, identity)?;

        if let Some(spend) = input.spend {
            if !spend.is_finite() || spend < 0.0 {
                return Err(ValidationError::new("spend must be a non-negative number").into());
            }
        }

        let today = now.date_naive();
        let mut state = self.store().state(workspace)?;
        if state.ran_on(today) && !input.force {
            info!("Morning run already happened today, skipping");
            return Ok(MorningRunReport::skipped(today));
        }

        let policy = self.store().policy(workspace)?;
        let mut alerts_raised = Vec::new();
        let mut approvals_opened = Vec::new();

        // Missing upstream tokens. Deduped per category while the
        // previous alert stays open.
        for api in REQUIRED_TOKENS {
            if self.config().get_token(api)?.is_none() {
                let alert = self.store().raise_alert(
                    workspace,
                    NewAlertBuilder::default()
                        .alert_type("missing_token")
                        .severity(AlertSeverity::High)
                        .message(format!("no API token configured for {}", api))
                        .meta(json!({"api": api}))
                        .dedupe_key(Some(format!("missing_token:{}", api)))
                        .build()
                        .map_err(|e| ValidationError::new(e.to_string()))?,
                    now,
                )?;
                alerts_raised.push(alert.id().clone());
            }
        }

        // Overspend check. Each trip is a fresh alert plus a pending
        // high-risk approval to pause the overspending campaigns.
        if let Some(spend) = input.spend {
            if spend > *policy.spend_threshold() {
                let alert = self.store().raise_alert(
                    workspace,
                    NewAlertBuilder::default()
                        .alert_type("spend_threshold_exceeded")
                        .severity(AlertSeverity::High)
                        .message(format!(
                            "spend {} exceeds threshold {}",
                            spend,
                            policy.spend_threshold()
                        ))
                        .meta(json!({"spend": spend, "threshold": policy.spend_threshold()}))
                        .build()
                        .map_err(|e| ValidationError::new(e.to_string()))?,
                    now,
                )?;
                alerts_raised.push(alert.id().clone());

                let approval = self.store().request_approval(
                    workspace,
                    NewApprovalBuilder::default()
                        .title("Pause overspending campaigns")
                        .reason(format!(
                            "spend {} exceeded threshold {}",
                            spend,
                            policy.spend_threshold()
                        ))
                        .risk(AlertSeverity::High)
                        .action("marketing.pause_overspend")
                        .payload(json!({"spend": spend}))
                        .requested_by(identity.id().clone())
                        .build()
                        .map_err(|e| ValidationError::new(e.to_string()))?,
                    now,
                )?;
                approvals_opened.push(approval.id().clone());
            }
        }

        // Lead follow-up sweep.
        let leads_flagged: Vec<String> = self
            .store()
            .leads(workspace)?
            .iter()
            .filter(|l| l.needs_follow_up())
            .map(|l| l.id().clone())
            .collect();
        if !leads_flagged.is_empty() {
            let alert = self.store().raise_alert(
                workspace,
                NewAlertBuilder::default()
                    .alert_type("leads_need_follow_up")
                    .severity(AlertSeverity::Medium)
                    .message(format!("{} leads need follow-up", leads_flagged.len()))
                    .meta(json!({"lead_ids": leads_flagged}))
                    .dedupe_key(Some("leads_need_follow_up".to_string()))
                    .build()
                    .map_err(|e| ValidationError::new(e.to_string()))?,
                now,
            )?;
            alerts_raised.push(alert.id().clone());

            if *policy.require_approval_for_bulk_whatsapp() {
                let approval = self.store().request_approval(
                    workspace,
                    NewApprovalBuilder::default()
                        .title("Send bulk WhatsApp follow-ups")
                        .reason(format!(
                            "{} leads flagged for follow-up",
                            leads_flagged.len()
                        ))
                        .risk(AlertSeverity::High)
                        .action("send_bulk_whatsapp")
                        .payload(json!({"lead_ids": leads_flagged}))
                        .requested_by(identity.id().clone())
                        .build()
                        .map_err(|e| ValidationError::new(e.to_string()))?,
                    now,
                )?;
                approvals_opened.push(approval.id().clone());
            }
        }

        let report = MorningRunReport {
            executed: true,
            date: today,
            alerts_raised,
            approvals_opened,
            leads_flagged,
        };

        self.store().append_outcome(
            workspace,
            Outcome::record(
                "morning_run",
                format!(
                    "raised {} alerts, opened {} approvals",
                    report.alerts_raised.len(),
                    report.approvals_opened.len()
                ),
                serde_json::to_value(&report).unwrap_or(serde_json::Value::Null),
                now,
            ),
        )?;
        self.audit(
            workspace,
            identity,
            "ops.morning_run",
            json!({
                "date": today,
                "forced": input.force,
                "alerts_raised": report.alerts_raised.len(),
                "approvals_opened": report.approvals_opened.len(),
            }),
            now,
        )?;

        state.record_morning_run(today);
        self.store().save_state(workspace, &state)?;

        info!(
            alerts = report.alerts_raised.len(),
            approvals = report.approvals_opened.len(),
            "Morning run complete"
        );
        Ok(report)
    }
}
