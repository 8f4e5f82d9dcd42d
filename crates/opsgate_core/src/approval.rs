//! Risk-gated approval requests.

use crate::AlertSeverity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Approval lifecycle status. Transitions exactly once,
/// `Pending -> {Approved, Rejected}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a decision
    Pending,
    /// Approved; side effects dispatched
    Approved,
    /// Rejected
    Rejected,
}

/// Input for requesting an approval.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct NewApproval {
    /// Short title
    title: String,
    /// Why the approval is needed
    reason: String,
    /// Risk severity of the underlying action
    risk: AlertSeverity,
    /// Action identifier, e.g. `marketing.pause_overspend`
    action: String,
    /// Action payload to apply on approval
    #[builder(default)]
    #[serde(default)]
    payload: Value,
    /// Who requested the approval
    requested_by: String,
}

/// A pending or resolved approval request.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct Approval {
    /// Unique approval id
    id: String,
    /// Short title
    title: String,
    /// Why the approval is needed
    reason: String,
    /// Risk severity of the underlying action
    risk: AlertSeverity,
    /// Action identifier
    action: String,
    /// Action payload to apply on approval
    #[serde(default)]
    payload: Value,
    /// Who requested the approval
    requested_by: String,
    /// Lifecycle status
    status: ApprovalStatus,
    /// When the approval was requested
    requested_at: DateTime<Utc>,
    /// When the decision was made
    #[serde(default)]
    decided_at: Option<DateTime<Utc>>,
    /// Who made the decision
    #[serde(default)]
    decided_by: Option<String>,
    /// Free-form note attached to the decision
    #[serde(default)]
    decision_note: Option<String>,
}

impl Approval {
    /// Open a new pending approval.
    pub fn request(input: NewApproval, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: input.title,
            reason: input.reason,
            risk: input.risk,
            action: input.action,
            payload: input.payload,
            requested_by: input.requested_by,
            status: ApprovalStatus::Pending,
            requested_at: now,
            decided_at: None,
            decided_by: None,
            decision_note: None,
        }
    }

    /// Whether a decision is still possible.
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Record a terminal decision. The first decision wins; resolving
    /// a non-pending approval leaves the stored state untouched and
    /// returns `false`.
    pub fn resolve(
        &mut self,
        approved: bool,
        decided_by: impl Into<String>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        self.decided_at = Some(now);
        self.decided_by = Some(decided_by.into());
        self.decision_note = note;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Approval {
        Approval::request(
            NewApprovalBuilder::default()
                .title("Pause overspending campaigns")
                .reason("spend exceeded threshold")
                .risk(AlertSeverity::High)
                .action("marketing.pause_overspend")
                .payload(json!({"spend": 250}))
                .requested_by("morning_run")
                .build()
                .expect("valid NewApproval"),
            Utc::now(),
        )
    }

    #[test]
    fn test_first_decision_wins() {
        let mut approval = sample();
        assert!(approval.resolve(true, "admin", None, Utc::now()));
        assert_eq!(*approval.status(), ApprovalStatus::Approved);

        // A second decision is a no-op on stored terminal state.
        assert!(!approval.resolve(false, "intruder", None, Utc::now()));
        assert_eq!(*approval.status(), ApprovalStatus::Approved);
        assert_eq!(approval.decided_by().as_deref(), Some("admin"));
    }

    #[test]
    fn test_reject_path() {
        let mut approval = sample();
        assert!(approval.resolve(false, "admin", Some("not now".into()), Utc::now()));
        assert_eq!(*approval.status(), ApprovalStatus::Rejected);
        assert_eq!(approval.decision_note().as_deref(), Some("not now"));
    }
}
